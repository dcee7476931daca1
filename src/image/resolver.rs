// file: src/image/resolver.rs
// version: 1.0.0
// guid: 4827666b-7b62-461c-a659-038bdf1d2f30

//! Image resolution cascade
//!
//! Local inventory first, then the node's remote catalog, importing from the
//! catalog only when the image is not yet on the node.

use super::Image;
use crate::error::{FleetError, Result};
use crate::network::CommandRunner;
use crate::parser::{decode_image_manifests, ImageManifest};
use crate::protocol::{ImageQuery, RemoteCommand};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct ImageResolver {
    runner: Arc<dyn CommandRunner>,
}

impl ImageResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Resolve `name`/`version` on `node`, importing it when only the catalog has it
    pub async fn resolve(&self, node: &str, name: &str, version: &str) -> Result<Image> {
        let query = ImageQuery::new(name, version)?;

        if let Some(manifest) = self.query(node, RemoteCommand::LocalImages(query.clone())).await? {
            debug!("Image {} already present on {}", query, node);
            return Ok(Image::from_manifest(node, manifest));
        }

        let manifest = self
            .query(node, RemoteCommand::AvailableImages(query.clone()))
            .await?
            .ok_or_else(|| FleetError::ImageNotFound {
                node: node.to_string(),
                reference: query.to_string(),
            })?;

        self.import(node, manifest.uuid).await?;
        Ok(Image::from_manifest(node, manifest))
    }

    /// Find `name`/`version` locally or in the catalog without importing it
    pub async fn lookup(&self, node: &str, name: &str, version: &str) -> Result<Image> {
        let query = ImageQuery::new(name, version)?;

        let local = self.query(node, RemoteCommand::LocalImages(query.clone())).await?;
        let manifest = match local {
            Some(manifest) => manifest,
            None => self
                .query(node, RemoteCommand::AvailableImages(query.clone()))
                .await?
                .ok_or_else(|| FleetError::ImageNotFound {
                    node: node.to_string(),
                    reference: query.to_string(),
                })?,
        };

        Ok(Image::from_manifest(node, manifest))
    }

    /// Make sure the image with `id` is installed on `node`
    pub async fn ensure_imported(&self, node: &str, id: Uuid) -> Result<Image> {
        if let Some(manifest) = self.query(node, RemoteCommand::LocalImageById(id)).await? {
            debug!("Image {} already present on {}", id, node);
            return Ok(Image::from_manifest(node, manifest));
        }

        let manifest = self
            .query(node, RemoteCommand::AvailableImageById(id))
            .await?
            .ok_or_else(|| FleetError::ImageNotFound {
                node: node.to_string(),
                reference: id.to_string(),
            })?;

        self.import(node, id).await?;
        Ok(Image::from_manifest(node, manifest))
    }

    async fn query(&self, node: &str, command: RemoteCommand) -> Result<Option<ImageManifest>> {
        let command_line = command.command_line();
        let output = self.runner.run(node, &command_line, &[]).await?;
        debug!("Returned data: {}", output.stdout_lossy());

        let manifests = decode_image_manifests(&command_line, &output.stdout)?;
        Ok(manifests.into_iter().next())
    }

    async fn import(&self, node: &str, id: Uuid) -> Result<()> {
        info!("Importing image {} onto {}", id, node);
        let command_line = RemoteCommand::ImportImage(id).command_line();
        let output = self.runner.run(node, &command_line, &[]).await?;
        debug!("Returned data: {}", output.combined_text());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::executor::MockCommandRunner;
    use crate::network::CommandOutput;
    use mockall::Sequence;

    const IMAGE: &str = "1d05e788-5409-11eb-b12f-037bd7fee4ee";

    fn listing(entries: &[(&str, &str, &str)]) -> CommandOutput {
        let items: Vec<serde_json::Value> = entries
            .iter()
            .map(|(uuid, name, version)| {
                serde_json::json!({ "manifest": { "uuid": uuid, "name": name, "version": version } })
            })
            .collect();
        CommandOutput {
            stdout: serde_json::to_vec(&items).unwrap(),
            stderr: Vec::new(),
            exit_status: 0,
        }
    }

    fn expect_command(
        mock: &mut MockCommandRunner,
        seq: &mut Sequence,
        expected: &'static str,
        output: CommandOutput,
    ) {
        mock.expect_run()
            .withf(move |node, command, input| {
                node == "node-a" && command == expected && input.is_empty()
            })
            .times(1)
            .in_sequence(seq)
            .returning(move |_, _, _| Ok(output.clone()));
    }

    #[tokio::test]
    async fn test_local_hit_only_queries_inventory() {
        let mut mock = MockCommandRunner::new();
        let mut seq = Sequence::new();
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm list -j name=base-64-lts version=20.4.0",
            listing(&[(IMAGE, "base-64-lts", "20.4.0")]),
        );
        let resolver = ImageResolver::new(Arc::new(mock));

        let image = resolver.resolve("node-a", "base-64-lts", "20.4.0").await.unwrap();

        assert_eq!(image.id.to_string(), IMAGE);
        assert_eq!(image.node_name, "node-a");
    }

    #[tokio::test]
    async fn test_remote_only_image_is_imported_in_order() {
        let mut mock = MockCommandRunner::new();
        let mut seq = Sequence::new();
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm list -j name=base-64-lts version=20.4.0",
            listing(&[]),
        );
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm avail -j name=base-64-lts version=20.4.0",
            listing(&[(IMAGE, "base-64-lts", "20.4.0")]),
        );
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm import 1d05e788-5409-11eb-b12f-037bd7fee4ee",
            CommandOutput::default(),
        );
        let resolver = ImageResolver::new(Arc::new(mock));

        let image = resolver.resolve("node-a", "base-64-lts", "20.4.0").await.unwrap();

        assert_eq!(image.name, "base-64-lts");
        assert_eq!(image.version, "20.4.0");
    }

    #[tokio::test]
    async fn test_absent_everywhere_is_not_found() {
        let mut mock = MockCommandRunner::new();
        let mut seq = Sequence::new();
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm list -j name=missing version=1.0",
            listing(&[]),
        );
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm avail -j name=missing version=1.0",
            listing(&[]),
        );
        let resolver = ImageResolver::new(Arc::new(mock));

        let result = resolver.resolve("node-a", "missing", "1.0").await;

        match result {
            Err(FleetError::ImageNotFound { node, reference }) => {
                assert_eq!(node, "node-a");
                assert_eq!(reference, "missing@1.0");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_never_imports() {
        let mut mock = MockCommandRunner::new();
        let mut seq = Sequence::new();
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm list -j name=base-64-lts version=20.4.0",
            listing(&[]),
        );
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm avail -j name=base-64-lts version=20.4.0",
            listing(&[(IMAGE, "base-64-lts", "20.4.0")]),
        );
        let resolver = ImageResolver::new(Arc::new(mock));

        let image = resolver.lookup("node-a", "base-64-lts", "20.4.0").await.unwrap();

        assert_eq!(image.id.to_string(), IMAGE);
    }

    #[tokio::test]
    async fn test_ensure_imported_is_noop_when_present() {
        let mut mock = MockCommandRunner::new();
        let mut seq = Sequence::new();
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm list -j uuid=1d05e788-5409-11eb-b12f-037bd7fee4ee",
            listing(&[(IMAGE, "base-64-lts", "20.4.0")]),
        );
        let resolver = ImageResolver::new(Arc::new(mock));

        let id = Uuid::parse_str(IMAGE).unwrap();
        assert!(resolver.ensure_imported("node-a", id).await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_imported_imports_from_catalog() {
        let mut mock = MockCommandRunner::new();
        let mut seq = Sequence::new();
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm list -j uuid=1d05e788-5409-11eb-b12f-037bd7fee4ee",
            listing(&[]),
        );
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm avail -j uuid=1d05e788-5409-11eb-b12f-037bd7fee4ee",
            listing(&[(IMAGE, "base-64-lts", "20.4.0")]),
        );
        expect_command(
            &mut mock,
            &mut seq,
            "imgadm import 1d05e788-5409-11eb-b12f-037bd7fee4ee",
            CommandOutput::default(),
        );
        let resolver = ImageResolver::new(Arc::new(mock));

        let id = Uuid::parse_str(IMAGE).unwrap();
        let image = resolver.ensure_imported("node-a", id).await.unwrap();
        assert_eq!(image.id, id);
    }

    #[tokio::test]
    async fn test_invalid_query_makes_no_remote_call() {
        let mock = MockCommandRunner::new();
        let resolver = ImageResolver::new(Arc::new(mock));

        let result = resolver.resolve("node-a", "base 64", "`id`").await;

        assert!(matches!(result, Err(FleetError::Configuration(_))));
    }
}
