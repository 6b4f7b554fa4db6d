//! IAM policy documents

use serde_json::json;

/// Trust policy letting EC2 instances assume the node role
pub const EC2_ASSUME_ROLE_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Effect": "Allow",
            "Principal": {
                "Service": "ec2.amazonaws.com"
            },
            "Action": "sts:AssumeRole"
        }
    ]
}"#;

/// Managed policies created for a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDocument {
    /// Nodes read and write bootstrap artifacts (the join command)
    NodeArtifacts,
    /// The in-cluster infrastructure controller manages every resource kind
    ControllerAdmin,
}

impl PolicyDocument {
    /// JSON policy document
    #[must_use]
    pub fn to_json(self) -> String {
        let statement = match self {
            PolicyDocument::NodeArtifacts => json!({
                "Effect": "Allow",
                "Action": ["s3:GetObject", "s3:PutObject"],
                "Resource": "*"
            }),
            PolicyDocument::ControllerAdmin => json!({
                "Effect": "Allow",
                "Action": "*",
                "Resource": "*"
            }),
        };
        json!({
            "Version": "2012-10-17",
            "Statement": [statement]
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_policy_allows_artifact_access_only() {
        let doc: serde_json::Value =
            serde_json::from_str(&PolicyDocument::NodeArtifacts.to_json()).unwrap();
        assert_eq!(doc["Statement"][0]["Action"], json!(["s3:GetObject", "s3:PutObject"]));
    }

    #[test]
    fn test_assume_role_policy_is_valid_json() {
        let doc: serde_json::Value = serde_json::from_str(EC2_ASSUME_ROLE_POLICY).unwrap();
        assert_eq!(doc["Statement"][0]["Principal"]["Service"], "ec2.amazonaws.com");
    }
}
