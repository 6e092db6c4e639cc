// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `finalizers.rs`

#[cfg(test)]
mod tests {
    use crate::binding_errors::BindingError;
    use crate::crd::{ServiceBinding, ServiceBindingSpec};
    use crate::reconcilers::finalizers::{
        ensure_finalizer, handle_deletion, remove_finalizer, FinalizerCleanup,
    };
    use crate::resources::ResourceClient;
    use crate::resources_fake::FakeResourceClient;
    use crate::test_fixtures::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::api::ApiResource;
    use kube::Resource;
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const TEST_FINALIZER: &str = "test.example.dev/finalizer";

    /// A binding wrapper whose cleanup records that it ran, or fails.
    #[derive(Clone)]
    struct Recorded {
        inner: ServiceBinding,
        cleaned: Arc<AtomicBool>,
        fail: bool,
    }

    impl Resource for Recorded {
        type DynamicType = ();
        type Scope = kube::core::NamespaceResourceScope;

        fn kind(dt: &()) -> Cow<'_, str> {
            ServiceBinding::kind(dt)
        }
        fn group(dt: &()) -> Cow<'_, str> {
            ServiceBinding::group(dt)
        }
        fn version(dt: &()) -> Cow<'_, str> {
            ServiceBinding::version(dt)
        }
        fn plural(dt: &()) -> Cow<'_, str> {
            ServiceBinding::plural(dt)
        }
        fn meta(&self) -> &ObjectMeta {
            self.inner.meta()
        }
        fn meta_mut(&mut self) -> &mut ObjectMeta {
            self.inner.meta_mut()
        }
    }

    #[async_trait::async_trait]
    impl FinalizerCleanup for Recorded {
        async fn cleanup(&self, _client: &dyn ResourceClient) -> Result<(), BindingError> {
            if self.fail {
                return Err(BindingError::ApplicationNotFound);
            }
            self.cleaned.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn resource() -> ApiResource {
        ApiResource::erase::<ServiceBinding>(&())
    }

    fn stored(client: &FakeResourceClient) -> Vec<String> {
        client
            .object(&resource(), NAMESPACE, BINDING_NAME)
            .and_then(|o| serde_json::from_value(o["metadata"]["finalizers"].clone()).ok())
            .unwrap_or_default()
    }

    fn seeded(binding: &ServiceBinding) -> FakeResourceClient {
        let client = FakeResourceClient::new();
        client.insert(&resource(), serde_json::to_value(binding).unwrap());
        client
    }

    fn with_finalizers(finalizers: &[&str]) -> ServiceBinding {
        let mut sb = binding(ServiceBindingSpec::default());
        sb.metadata.finalizers = Some(finalizers.iter().map(ToString::to_string).collect());
        sb
    }

    #[tokio::test]
    async fn test_ensure_finalizer_adds_once() {
        let sb = with_finalizers(&["other/finalizer"]);
        let client = seeded(&sb);

        ensure_finalizer(&client, &sb, TEST_FINALIZER).await.unwrap();
        assert_eq!(stored(&client), vec!["other/finalizer", TEST_FINALIZER]);

        let sb = with_finalizers(&["other/finalizer", TEST_FINALIZER]);
        client.clear_calls();
        ensure_finalizer(&client, &sb, TEST_FINALIZER).await.unwrap();
        assert_eq!(client.count("patch"), 0);
    }

    #[tokio::test]
    async fn test_remove_finalizer_keeps_others() {
        let sb = with_finalizers(&[TEST_FINALIZER, "other/finalizer"]);
        let client = seeded(&sb);

        remove_finalizer(&client, &sb, TEST_FINALIZER).await.unwrap();
        assert_eq!(stored(&client), vec!["other/finalizer"]);

        let sb = with_finalizers(&["other/finalizer"]);
        client.clear_calls();
        remove_finalizer(&client, &sb, TEST_FINALIZER).await.unwrap();
        assert_eq!(client.count("patch"), 0);
    }

    #[tokio::test]
    async fn test_handle_deletion_runs_cleanup_then_removes() {
        let sb = with_finalizers(&[TEST_FINALIZER]);
        let client = seeded(&sb);
        let recorded = Recorded {
            inner: sb,
            cleaned: Arc::new(AtomicBool::new(false)),
            fail: false,
        };

        handle_deletion(&client, &recorded, TEST_FINALIZER)
            .await
            .unwrap();
        assert!(recorded.cleaned.load(Ordering::SeqCst));
        assert!(stored(&client).is_empty());
    }

    #[tokio::test]
    async fn test_handle_deletion_without_finalizer_is_noop() {
        let sb = with_finalizers(&[]);
        let client = seeded(&sb);
        let recorded = Recorded {
            inner: sb,
            cleaned: Arc::new(AtomicBool::new(false)),
            fail: false,
        };

        handle_deletion(&client, &recorded, TEST_FINALIZER)
            .await
            .unwrap();
        assert!(!recorded.cleaned.load(Ordering::SeqCst));
        assert!(client.writes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_cleanup_keeps_finalizer() {
        let sb = with_finalizers(&[TEST_FINALIZER]);
        let client = seeded(&sb);
        let recorded = Recorded {
            inner: sb,
            cleaned: Arc::new(AtomicBool::new(false)),
            fail: true,
        };

        assert!(handle_deletion(&client, &recorded, TEST_FINALIZER)
            .await
            .is_err());
        assert_eq!(stored(&client), vec![TEST_FINALIZER]);
    }
}
