//! IAM resources: policies, roles, instance profiles, groups and users

use super::{AwsProvider, ignore_missing};
use crate::error::{CloudError, from_sdk};
use crate::models::{AccessKey, Created, ResourceRef};
use crate::policy::{EC2_ASSUME_ROLE_POLICY, PolicyDocument};
use tracing::debug;

impl AwsProvider {
    pub(super) async fn create_policy(&self, name: &str, document: PolicyDocument) -> Result<ResourceRef, CloudError> {
        let output = self
            .iam
            .create_policy()
            .policy_name(name)
            .policy_document(document.to_json())
            .send()
            .await
            .map_err(|e| from_sdk("CreatePolicy", &e))?;

        let arn = output
            .policy()
            .and_then(|policy| policy.arn())
            .ok_or(CloudError::MissingField {
                operation: "CreatePolicy",
                field: "Arn",
            })?;
        Ok(ResourceRef::IamPolicy { arn: arn.to_string() })
    }

    pub(super) async fn delete_policy(&self, arn: &str) -> Result<(), CloudError> {
        self.iam
            .delete_policy()
            .policy_arn(arn)
            .send()
            .await
            .map_err(|e| from_sdk("DeletePolicy", &e))?;
        Ok(())
    }

    /// EC2-assumable role with the given managed policy attached
    pub(super) async fn create_role(&self, name: &str, policy_arn: &str) -> Result<ResourceRef, CloudError> {
        self.iam
            .create_role()
            .role_name(name)
            .assume_role_policy_document(EC2_ASSUME_ROLE_POLICY)
            .send()
            .await
            .map_err(|e| from_sdk("CreateRole", &e))?;

        let role = ResourceRef::IamRole {
            name: name.to_string(),
            policy_arn: policy_arn.to_string(),
        };
        if let Err(e) = self
            .iam
            .attach_role_policy()
            .role_name(name)
            .policy_arn(policy_arn)
            .send()
            .await
        {
            let err = from_sdk("AttachRolePolicy", &e);
            self.discard(role).await;
            return Err(err);
        }
        debug!(role = %name, policy_arn = %policy_arn, "Policy attached to role");
        Ok(role)
    }

    pub(super) async fn delete_role(&self, name: &str, policy_arn: &str) -> Result<(), CloudError> {
        ignore_missing(
            self.iam
                .detach_role_policy()
                .role_name(name)
                .policy_arn(policy_arn)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| from_sdk("DetachRolePolicy", &e)),
        )?;

        self.iam
            .delete_role()
            .role_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteRole", &e))?;
        Ok(())
    }

    pub(super) async fn create_instance_profile(&self, name: &str, role_name: &str) -> Result<ResourceRef, CloudError> {
        self.iam
            .create_instance_profile()
            .instance_profile_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("CreateInstanceProfile", &e))?;

        let profile = ResourceRef::InstanceProfile {
            name: name.to_string(),
            role_name: role_name.to_string(),
        };
        if let Err(e) = self
            .iam
            .add_role_to_instance_profile()
            .instance_profile_name(name)
            .role_name(role_name)
            .send()
            .await
        {
            let err = from_sdk("AddRoleToInstanceProfile", &e);
            self.discard(profile).await;
            return Err(err);
        }
        Ok(profile)
    }

    pub(super) async fn delete_instance_profile(&self, name: &str, role_name: &str) -> Result<(), CloudError> {
        ignore_missing(
            self.iam
                .remove_role_from_instance_profile()
                .instance_profile_name(name)
                .role_name(role_name)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| from_sdk("RemoveRoleFromInstanceProfile", &e)),
        )?;

        self.iam
            .delete_instance_profile()
            .instance_profile_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteInstanceProfile", &e))?;
        Ok(())
    }

    pub(super) async fn create_group(&self, name: &str, policy_arn: &str) -> Result<ResourceRef, CloudError> {
        self.iam
            .create_group()
            .group_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("CreateGroup", &e))?;

        let group = ResourceRef::IamGroup {
            name: name.to_string(),
            policy_arn: policy_arn.to_string(),
        };
        if let Err(e) = self
            .iam
            .attach_group_policy()
            .group_name(name)
            .policy_arn(policy_arn)
            .send()
            .await
        {
            let err = from_sdk("AttachGroupPolicy", &e);
            self.discard(group).await;
            return Err(err);
        }
        Ok(group)
    }

    pub(super) async fn delete_group(&self, name: &str, policy_arn: &str) -> Result<(), CloudError> {
        ignore_missing(
            self.iam
                .detach_group_policy()
                .group_name(name)
                .policy_arn(policy_arn)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| from_sdk("DetachGroupPolicy", &e)),
        )?;

        self.iam
            .delete_group()
            .group_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteGroup", &e))?;
        Ok(())
    }

    /// Create the user, add it to its group and issue an access key
    pub(super) async fn create_user(&self, name: &str, group_name: &str) -> Result<Created, CloudError> {
        self.iam
            .create_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("CreateUser", &e))?;

        let mut user = ResourceRef::IamUser {
            name: name.to_string(),
            group_name: group_name.to_string(),
            access_key_id: None,
        };

        let credentials = match self.add_to_group_with_key(name, group_name).await {
            Ok(credentials) => credentials,
            Err(e) => {
                self.discard(user).await;
                return Err(e);
            }
        };

        if let ResourceRef::IamUser { access_key_id, .. } = &mut user {
            *access_key_id = Some(credentials.access_key_id.clone());
        }
        Ok(Created {
            resource: user,
            credentials: Some(credentials),
        })
    }

    async fn add_to_group_with_key(&self, name: &str, group_name: &str) -> Result<AccessKey, CloudError> {
        self.iam
            .add_user_to_group()
            .user_name(name)
            .group_name(group_name)
            .send()
            .await
            .map_err(|e| from_sdk("AddUserToGroup", &e))?;

        let output = self
            .iam
            .create_access_key()
            .user_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("CreateAccessKey", &e))?;

        let key: Option<&aws_sdk_iam::types::AccessKey> = Option::from(output.access_key());
        let key = key.ok_or(CloudError::MissingField {
            operation: "CreateAccessKey",
            field: "AccessKey",
        })?;
        Ok(AccessKey {
            access_key_id: key.access_key_id().to_string(),
            secret_access_key: key.secret_access_key().to_string(),
        })
    }

    /// Delete the access key, leave the group, then delete the user
    pub(super) async fn delete_user(
        &self,
        name: &str,
        group_name: &str,
        access_key_id: Option<&str>,
    ) -> Result<(), CloudError> {
        if let Some(key_id) = access_key_id {
            ignore_missing(
                self.iam
                    .delete_access_key()
                    .user_name(name)
                    .access_key_id(key_id)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| from_sdk("DeleteAccessKey", &e)),
            )?;
        }

        ignore_missing(
            self.iam
                .remove_user_from_group()
                .user_name(name)
                .group_name(group_name)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| from_sdk("RemoveUserFromGroup", &e)),
        )?;

        self.iam
            .delete_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteUser", &e))?;
        Ok(())
    }
}
