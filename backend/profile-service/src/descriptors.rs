//! Method and message descriptors of `example.v1.ProfileService`

use grpc_auth_pipeline::{
    AccessRequirement, ConfigError, DescriptorRegistry, DescriptorSet, MessageDescriptor,
    MethodDescriptor, MethodIdentity,
};

pub const GET_PROFILE: &str = "example.v1.ProfileService/GetProfile";
pub const UPDATE_PROFILE: &str = "example.v1.ProfileService/UpdateProfile";
pub const DELETE_PROFILE: &str = "example.v1.ProfileService/DeleteProfile";
pub const LIST_PROFILES: &str = "example.v1.ProfileService/ListProfiles";
pub const PING: &str = "example.v1.ProfileService/Ping";

pub fn descriptor_set() -> Result<DescriptorSet, ConfigError> {
    Ok(DescriptorSet::default()
        .message(MessageDescriptor::new("Empty"))
        .message(MessageDescriptor::new("Address").field("city").sensitive_field("street"))
        .message(
            MessageDescriptor::new("Profile")
                .field("subject")
                .field("name")
                .sensitive_field("email")
                .message_field("address", "Address"),
        )
        .message(
            MessageDescriptor::new("UpdateProfileRequest")
                .field("name")
                .field("email")
                .message_field("address", "Address"),
        )
        .message(MessageDescriptor::new("DeleteProfileRequest").field("subject"))
        .message(
            MessageDescriptor::new("DeleteProfileResponse")
                .field("subject")
                .field("deleted"),
        )
        .message(MessageDescriptor::new("ListProfilesRequest").field("limit"))
        .message(MessageDescriptor::new("PingResponse").field("status"))
        .method(
            MethodDescriptor::unary(MethodIdentity::parse(GET_PROFILE)?, "Empty", "Profile")
                .uses_sensitive_data()
                .access(AccessRequirement::Authenticated),
        )
        .method(
            MethodDescriptor::unary(
                MethodIdentity::parse(UPDATE_PROFILE)?,
                "UpdateProfileRequest",
                "Profile",
            )
            .uses_sensitive_data()
            .access(AccessRequirement::Authenticated),
        )
        .method(
            MethodDescriptor::unary(
                MethodIdentity::parse(DELETE_PROFILE)?,
                "DeleteProfileRequest",
                "DeleteProfileResponse",
            )
            .access(AccessRequirement::roles(["admin"])),
        )
        .method(
            MethodDescriptor::unary(
                MethodIdentity::parse(LIST_PROFILES)?,
                "ListProfilesRequest",
                "Profile",
            )
            .server_streaming()
            .uses_sensitive_data(),
        )
        .method(MethodDescriptor::unary(
            MethodIdentity::parse(PING)?,
            "Empty",
            "PingResponse",
        )))
}

pub fn registry() -> Result<DescriptorRegistry, ConfigError> {
    DescriptorRegistry::new(descriptor_set()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_valid() {
        let registry = registry().unwrap();
        assert_eq!(registry.len(), 5);

        let get = MethodIdentity::parse(GET_PROFILE).unwrap();
        assert!(registry.redaction(&get).is_some());

        let list = MethodIdentity::parse(LIST_PROFILES).unwrap();
        assert!(registry.method(&list).is_some_and(|m| m.server_streaming));
        // access comes from configuration rules, not metadata
        assert!(registry.access(&list).is_none());

        let delete = MethodIdentity::parse(DELETE_PROFILE).unwrap();
        assert_eq!(
            registry.access(&delete),
            Some(&AccessRequirement::roles(["admin"]))
        );
    }
}
