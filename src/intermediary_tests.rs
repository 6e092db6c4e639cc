// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `intermediary.rs`

#[cfg(test)]
mod tests {
    use crate::crd::IntermediaryKind;
    use crate::envvars::BindingData;
    use crate::intermediary::*;
    use crate::resources::{config_map_resource, secret_resource};
    use crate::resources_fake::FakeResourceClient;
    use crate::test_fixtures::*;
    use std::collections::BTreeMap;

    fn data(pairs: &[(&str, &str)]) -> BindingData {
        BindingData {
            env_vars: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
                .collect::<BTreeMap<_, _>>(),
            volume_keys: Vec::new(),
        }
    }

    #[test]
    fn test_build_secret() {
        let binding = default_binding();
        let secret = build_intermediary(&binding, &data(&[("DATABASE_SECRET_USER", "user")])).unwrap();

        assert_eq!(secret["apiVersion"], "v1");
        assert_eq!(secret["kind"], "Secret");
        assert_eq!(secret["metadata"]["name"], BINDING_NAME);
        assert_eq!(secret["metadata"]["namespace"], NAMESPACE);
        assert_eq!(secret["data"]["DATABASE_SECRET_USER"], "dXNlcg==");
        assert_eq!(
            secret["metadata"]["annotations"]["service-binding-operator.operators.coreos.com/binding-name"],
            BINDING_NAME
        );
        assert_eq!(
            secret["metadata"]["labels"]["app.kubernetes.io/managed-by"],
            "ServiceBinding"
        );

        let owner = &secret["metadata"]["ownerReferences"][0];
        assert_eq!(owner["kind"], "ServiceBinding");
        assert_eq!(owner["uid"], "uid-binding");
        assert_eq!(owner["controller"], true);
    }

    #[test]
    fn test_build_config_map() {
        let mut binding = default_binding();
        binding.spec.intermediary_kind = IntermediaryKind::ConfigMap;
        let cm = build_intermediary(&binding, &data(&[("DATABASE_DBNAME", "db-demo")])).unwrap();

        assert_eq!(cm["kind"], "ConfigMap");
        assert_eq!(cm["data"]["DATABASE_DBNAME"], "db-demo");
        assert!(cm.get("binaryData").is_none());
    }

    #[tokio::test]
    async fn test_config_map_keeps_non_utf8_values_in_binary_data() {
        let client = FakeResourceClient::new();
        let mut binding = default_binding();
        binding.spec.intermediary_kind = IntermediaryKind::ConfigMap;
        let mut payload = data(&[("DATABASE_DBNAME", "db-demo")]);
        payload
            .env_vars
            .insert("DATABASE_SECRET_BLOB".to_string(), vec![0xff, 0x00, 0xfe]);

        let cm = commit(&client, &binding, &payload).await.unwrap();
        assert_eq!(cm["data"]["DATABASE_DBNAME"], "db-demo");
        assert!(cm["data"].get("DATABASE_SECRET_BLOB").is_none());
        assert_eq!(cm["binaryData"]["DATABASE_SECRET_BLOB"], "/wD+");

        // Dropping the binary value clears `binaryData`.
        commit(&client, &binding, &data(&[("DATABASE_DBNAME", "db-demo")]))
            .await
            .unwrap();
        let stored = client
            .object(&config_map_resource(), NAMESPACE, BINDING_NAME)
            .unwrap();
        assert!(stored.get("binaryData").is_none());
    }

    #[tokio::test]
    async fn test_commit_creates_then_is_idempotent() {
        let client = FakeResourceClient::new();
        let binding = default_binding();
        let payload = data(&[("DATABASE_SECRET_USER", "user")]);

        let created = commit(&client, &binding, &payload).await.unwrap();
        assert_eq!(created["data"]["DATABASE_SECRET_USER"], "dXNlcg==");
        assert_eq!(client.count("create"), 1);

        client.clear_calls();
        let again = commit(&client, &binding, &payload).await.unwrap();
        assert_eq!(
            again["metadata"]["resourceVersion"],
            created["metadata"]["resourceVersion"]
        );
        assert_eq!(client.count("update"), 0);
    }

    #[tokio::test]
    async fn test_commit_updates_changed_data() {
        let client = FakeResourceClient::new();
        let binding = default_binding();
        commit(&client, &binding, &data(&[("DATABASE_SECRET_USER", "user")]))
            .await
            .unwrap();

        client.clear_calls();
        commit(&client, &binding, &data(&[("DATABASE_SECRET_USER", "admin")]))
            .await
            .unwrap();
        assert_eq!(client.count("update"), 1);

        let stored = client
            .object(&secret_resource(), NAMESPACE, BINDING_NAME)
            .unwrap();
        assert_eq!(stored["data"]["DATABASE_SECRET_USER"], "YWRtaW4=");
    }

    #[tokio::test]
    async fn test_commit_and_delete() {
        let client = FakeResourceClient::new();
        let mut binding = default_binding();
        binding.spec.intermediary_kind = IntermediaryKind::ConfigMap;

        commit(&client, &binding, &data(&[("K", "v")])).await.unwrap();
        assert!(client
            .object(&config_map_resource(), NAMESPACE, BINDING_NAME)
            .is_some());

        delete_intermediary(&client, &binding).await.unwrap();
        assert!(client
            .object(&config_map_resource(), NAMESPACE, BINDING_NAME)
            .is_none());

        // Deleting again is fine.
        delete_intermediary(&client, &binding).await.unwrap();
    }
}
