//! VPC networking resources

use super::{AwsProvider, ignore_missing};
use crate::error::{CloudError, from_sdk};
use crate::models::ResourceRef;
use aws_sdk_ec2::types::{Filter, IpPermission, IpRange};
use tracing::debug;

const ANYWHERE: &str = "0.0.0.0/0";

impl AwsProvider {
    pub(super) async fn create_vpc(&self, cidr: &str) -> Result<ResourceRef, CloudError> {
        let output = self
            .ec2
            .create_vpc()
            .cidr_block(cidr)
            .send()
            .await
            .map_err(|e| from_sdk("CreateVpc", &e))?;

        let id = output
            .vpc()
            .and_then(|vpc| vpc.vpc_id())
            .ok_or(CloudError::MissingField {
                operation: "CreateVpc",
                field: "VpcId",
            })?;
        Ok(ResourceRef::Vpc { id: id.to_string() })
    }

    pub(super) async fn delete_vpc(&self, id: &str) -> Result<(), CloudError> {
        self.ec2
            .delete_vpc()
            .vpc_id(id)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteVpc", &e))?;
        Ok(())
    }

    /// Main route table created together with the VPC
    pub(super) async fn lookup_route_table(&self, vpc_id: &str) -> Result<ResourceRef, CloudError> {
        let output = self
            .ec2
            .describe_route_tables()
            .filters(Filter::builder().name("vpc-id").values(vpc_id).build())
            .send()
            .await
            .map_err(|e| from_sdk("DescribeRouteTables", &e))?;

        let id = output
            .route_tables()
            .iter()
            .find_map(|table| table.route_table_id())
            .ok_or_else(|| CloudError::NotFound {
                operation: "DescribeRouteTables",
                code: "InvalidRouteTableID.NotFound".to_string(),
                message: format!("no route table for {vpc_id}"),
            })?;
        debug!(vpc_id = %vpc_id, route_table_id = %id, "Found main route table");
        Ok(ResourceRef::RouteTable { id: id.to_string() })
    }

    pub(super) async fn create_subnet(&self, vpc_id: &str, cidr: &str) -> Result<ResourceRef, CloudError> {
        let output = self
            .ec2
            .create_subnet()
            .vpc_id(vpc_id)
            .cidr_block(cidr)
            .send()
            .await
            .map_err(|e| from_sdk("CreateSubnet", &e))?;

        let id = output
            .subnet()
            .and_then(|subnet| subnet.subnet_id())
            .ok_or(CloudError::MissingField {
                operation: "CreateSubnet",
                field: "SubnetId",
            })?;
        Ok(ResourceRef::Subnet { id: id.to_string() })
    }

    pub(super) async fn delete_subnet(&self, id: &str) -> Result<(), CloudError> {
        self.ec2
            .delete_subnet()
            .subnet_id(id)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteSubnet", &e))?;
        Ok(())
    }

    /// Create a gateway, attach it to the VPC and route 0.0.0.0/0 through it
    pub(super) async fn create_internet_gateway(
        &self,
        vpc_id: &str,
        route_table_id: &str,
    ) -> Result<ResourceRef, CloudError> {
        let output = self
            .ec2
            .create_internet_gateway()
            .send()
            .await
            .map_err(|e| from_sdk("CreateInternetGateway", &e))?;

        let id = output
            .internet_gateway()
            .and_then(|igw| igw.internet_gateway_id())
            .ok_or(CloudError::MissingField {
                operation: "CreateInternetGateway",
                field: "InternetGatewayId",
            })?
            .to_string();
        let gateway = ResourceRef::InternetGateway {
            id: id.clone(),
            vpc_id: vpc_id.to_string(),
        };

        if let Err(e) = self.attach_and_route(&id, vpc_id, route_table_id).await {
            self.discard(gateway).await;
            return Err(e);
        }
        Ok(gateway)
    }

    async fn attach_and_route(&self, id: &str, vpc_id: &str, route_table_id: &str) -> Result<(), CloudError> {
        self.ec2
            .attach_internet_gateway()
            .internet_gateway_id(id)
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(|e| from_sdk("AttachInternetGateway", &e))?;

        self.ec2
            .create_route()
            .route_table_id(route_table_id)
            .destination_cidr_block(ANYWHERE)
            .gateway_id(id)
            .send()
            .await
            .map_err(|e| from_sdk("CreateRoute", &e))?;
        Ok(())
    }

    /// Detach from the VPC, then delete
    pub(super) async fn delete_internet_gateway(&self, id: &str, vpc_id: &str) -> Result<(), CloudError> {
        ignore_missing(
            self.ec2
                .detach_internet_gateway()
                .internet_gateway_id(id)
                .vpc_id(vpc_id)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| from_sdk("DetachInternetGateway", &e)),
        )?;

        self.ec2
            .delete_internet_gateway()
            .internet_gateway_id(id)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteInternetGateway", &e))?;
        Ok(())
    }

    pub(super) async fn create_security_group(
        &self,
        vpc_id: &str,
        name: &str,
        description: &str,
        ingress_ports: &[i32],
    ) -> Result<ResourceRef, CloudError> {
        let output = self
            .ec2
            .create_security_group()
            .group_name(name)
            .description(description)
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(|e| from_sdk("CreateSecurityGroup", &e))?;

        let id = output
            .group_id()
            .ok_or(CloudError::MissingField {
                operation: "CreateSecurityGroup",
                field: "GroupId",
            })?
            .to_string();
        let group = ResourceRef::SecurityGroup { id: id.clone() };

        if ingress_ports.is_empty() {
            return Ok(group);
        }

        let mut request = self.ec2.authorize_security_group_ingress().group_id(&id);
        for port in ingress_ports {
            request = request.ip_permissions(
                IpPermission::builder()
                    .ip_protocol("tcp")
                    .from_port(*port)
                    .to_port(*port)
                    .ip_ranges(IpRange::builder().cidr_ip(ANYWHERE).build())
                    .build(),
            );
        }
        if let Err(e) = request.send().await {
            let err = from_sdk("AuthorizeSecurityGroupIngress", &e);
            self.discard(group).await;
            return Err(err);
        }
        Ok(group)
    }

    pub(super) async fn delete_security_group(&self, id: &str) -> Result<(), CloudError> {
        self.ec2
            .delete_security_group()
            .group_id(id)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteSecurityGroup", &e))?;
        Ok(())
    }
}
