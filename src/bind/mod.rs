//! Bundle bind orchestration.
//!
//! This module provides the [`Binder`] that runs the full pipeline over a
//! resolved symbol graph: resolve facades, harvest packages, order
//! searches, validate, pack containers, serialize manifests and assemble
//! the final executable. Stages append to one shared diagnostics sink and
//! the pipeline stops after the first stage that recorded an error, so a
//! single run reports every problem it can reach.
//!
//! File handles are scoped to each step; in particular the output
//! executable is only ever mutated through the stub writer, which is
//! dropped before the result is returned.

use crate::container::{self, Compression};
use crate::error::{Error, ErrorExt, Result, StubError};
use crate::extension::{ContainerPayload, ExtensionRegistry};
use crate::harvest;
use crate::hash::sha256_file;
use crate::manifest::{self, assigned_payloads};
use crate::message::Messages;
use crate::order::{self, OrderedSearches};
use crate::reader::DatabaseOpener;
use crate::resolve::{self, PackageFacades};
use crate::stub::{self, ContainerSlot};
use crate::symbol::{
    ContainerSymbol, ContainerType, Packaging, PayloadSymbol, SymbolGraph,
    DEFAULT_ATTACHED_CONTAINER_ID,
};
use crate::validate;
use std::fs;
use std::path::{Path, PathBuf};

/// Well-known id of the UX container created when authoring omitted one.
const UX_CONTAINER_ID: &str = "WixUXContainer";

/// Embedded payload carrying the control manifest.
const MANIFEST_PAYLOAD_ID: &str = "WixBundleManifest";
/// Embedded payload carrying the bootstrapper-application data manifest.
const BA_DATA_PAYLOAD_ID: &str = "WixBootstrapperApplicationData";
/// Embedded payload carrying the extension data manifest.
const EXTENSION_DATA_PAYLOAD_ID: &str = "WixBootstrapperExtensionData";

/// Input and output locations for one bind.
#[derive(Debug, Clone)]
pub struct BindPaths {
    /// Bootstrapper stub executable used as the template.
    pub stub: PathBuf,
    /// Final bundle executable.
    pub output: PathBuf,
    /// Intermediate folder for manifests and packed containers.
    pub intermediate: PathBuf,
}

/// Outcome of a bind run.
#[derive(Debug)]
pub struct BindResult {
    /// Path of the bundle executable (only written when successful).
    pub output: PathBuf,
    /// Detached containers written alongside the executable.
    pub detached_containers: Vec<PathBuf>,
    /// Every diagnostic the run collected.
    pub messages: Messages,
}

impl BindResult {
    /// True when no error-severity message was recorded.
    pub fn succeeded(&self) -> bool {
        !self.messages.has_errors()
    }
}

/// Binds resolved symbol graphs into bundle executables.
///
/// The binder holds only the collaborators that outlive a single run: the
/// installer-database reader and the extension registry built during
/// pipeline setup.
pub struct Binder<'a> {
    opener: &'a dyn DatabaseOpener,
    extensions: &'a ExtensionRegistry,
    compression: Compression,
}

impl<'a> Binder<'a> {
    /// Creates a binder over the host-supplied collaborators.
    pub fn new(opener: &'a dyn DatabaseOpener, extensions: &'a ExtensionRegistry) -> Self {
        Self {
            opener,
            extensions,
            compression: Compression::default(),
        }
    }

    /// Overrides the default container compression.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Runs the full bind pipeline.
    ///
    /// Returns `Ok` with collected diagnostics even when the build fails;
    /// hard `Err` is reserved for environmental failures (unwritable
    /// intermediate folder and the like).
    pub fn bind(&self, graph: &mut SymbolGraph, paths: &BindPaths) -> Result<BindResult> {
        let mut messages = Messages::new();
        fs::create_dir_all(&paths.intermediate)
            .fs_context("creating intermediate folder", &paths.intermediate)?;

        log::info!("binding bundle {}", graph.bundle.name);

        resolve_payload_info(graph)?;

        let facades = resolve::resolve_facades(graph, &mut messages);
        if messages.has_errors() {
            return Ok(self.failed(paths, messages));
        }

        harvest::harvest_packages(graph, &facades, self.opener, self.extensions, &mut messages);
        if messages.has_errors() {
            return Ok(self.failed(paths, messages));
        }

        let searches = order::order_searches(graph, &mut messages);
        if messages.has_errors() {
            return Ok(self.failed(paths, messages));
        }

        assign_default_containers(graph);
        add_manifest_payloads(graph, &paths.intermediate);

        validate::validate_graph(graph, &mut messages);
        if messages.has_errors() {
            return Ok(self.failed(paths, messages));
        }

        self.pack_non_ux_containers(graph, paths, &mut messages)?;
        if messages.has_errors() {
            return Ok(self.failed(paths, messages));
        }

        self.write_manifests(graph, &facades, &searches, &paths.intermediate)?;
        self.pack_ux_container(graph, paths, &mut messages)?;
        if messages.has_errors() {
            return Ok(self.failed(paths, messages));
        }

        let detached_containers = self.assemble_executable(graph, paths)?;

        log::info!("bound {}", paths.output.display());
        Ok(BindResult {
            output: paths.output.clone(),
            detached_containers,
            messages,
        })
    }

    /// Extracts the containers of an existing bundle into `target`.
    ///
    /// The UX container lands in `target/UX`; attached containers land in
    /// `target/a1`, `target/a2`, ... by slot.
    pub fn unbind(&self, bundle: &Path, target: &Path) -> Result<Vec<PathBuf>> {
        let mut stub = stub::open_read(bundle)?;
        let count = stub.container_count() as usize;
        let scratch = tempfile::tempdir().fs_context("creating unbind scratch", target)?;

        let mut extracted = Vec::new();
        for slot in 0..count {
            let cab_path = scratch.path().join(format!("container{slot}.cab"));
            {
                let mut cab = fs::File::create(&cab_path)
                    .fs_context("writing extracted container", &cab_path)?;
                stub.read_container(slot, &mut cab)?;
            }
            let dir = if slot == 0 {
                target.join("UX")
            } else {
                target.join(format!("a{slot}"))
            };
            container::extract("attached", None, &cab_path, &dir, self.extensions)?;
            extracted.push(dir);
        }
        Ok(extracted)
    }

    fn failed(&self, paths: &BindPaths, messages: Messages) -> BindResult {
        log::warn!(
            "bind failed with {} error(s); skipping remaining steps",
            messages.error_count()
        );
        BindResult {
            output: paths.output.clone(),
            detached_containers: Vec::new(),
            messages,
        }
    }

    fn pack_non_ux_containers(
        &self,
        graph: &mut SymbolGraph,
        paths: &BindPaths,
        messages: &mut Messages,
    ) -> Result<()> {
        let container_ids: Vec<String> = graph
            .containers
            .iter()
            .filter(|c| c.container_type != ContainerType::Ux)
            .map(|c| c.id.clone())
            .collect();

        for id in container_ids {
            let container = graph.container(&id).expect("container id just listed").clone();
            let payloads = to_container_payloads(graph, &container);
            let work_path = paths.intermediate.join(&container.name);
            let packed = container::pack(
                &container,
                &payloads,
                &work_path,
                self.compression,
                self.extensions,
                messages,
            )?;
            if let Some(packed) = packed {
                let entry = graph
                    .containers
                    .iter_mut()
                    .find(|c| c.id == id)
                    .expect("container id just listed");
                entry.work_path = work_path;
                entry.size = packed.size;
                entry.hash = Some(packed.hash);
            }
        }
        Ok(())
    }

    fn write_manifests(
        &self,
        graph: &mut SymbolGraph,
        facades: &PackageFacades,
        searches: &OrderedSearches,
        intermediate: &Path,
    ) -> Result<()> {
        let manifest_path = intermediate.join("manifest.xml");
        {
            let mut file = fs::File::create(&manifest_path)
                .fs_context("creating control manifest", &manifest_path)?;
            manifest::write_burn_manifest(graph, facades, searches, &mut file)?;
        }

        let ba_data_path = intermediate.join("BootstrapperApplicationData.xml");
        {
            let mut file = fs::File::create(&ba_data_path)
                .fs_context("creating bootstrapper application data", &ba_data_path)?;
            manifest::write_ba_data(graph, facades, &mut file)?;
        }

        let extension_data_path = intermediate.join("BootstrapperExtensionData.xml");
        {
            let mut file = fs::File::create(&extension_data_path)
                .fs_context("creating extension data", &extension_data_path)?;
            manifest::write_extension_data(graph, searches, self.extensions, &mut file)?;
        }
        Ok(())
    }

    fn pack_ux_container(
        &self,
        graph: &mut SymbolGraph,
        paths: &BindPaths,
        messages: &mut Messages,
    ) -> Result<()> {
        let Some(ux) = graph
            .containers
            .iter()
            .find(|c| c.container_type == ContainerType::Ux)
            .cloned()
        else {
            return Ok(());
        };
        let payloads = to_container_payloads(graph, &ux);
        let work_path = paths.intermediate.join(&ux.name);
        if let Some(packed) = container::pack(
            &ux,
            &payloads,
            &work_path,
            self.compression,
            self.extensions,
            messages,
        )? {
            let entry = graph
                .containers
                .iter_mut()
                .find(|c| c.id == ux.id)
                .expect("UX container exists");
            entry.work_path = work_path;
            entry.size = packed.size;
            entry.hash = Some(packed.hash);
        }
        Ok(())
    }

    /// Copies the stub to the output path, stamps the bundle code and
    /// appends the UX container followed by every attached container in
    /// declared order. Detached containers are written alongside.
    fn assemble_executable(
        &self,
        graph: &mut SymbolGraph,
        paths: &BindPaths,
    ) -> Result<Vec<PathBuf>> {
        fs::copy(&paths.stub, &paths.output)
            .fs_context("copying stub executable", &paths.stub)?;

        let mut stub = stub::open_update(&paths.output)?;
        stub.set_bundle_code(graph.bundle.bundle_code)?;
        match stub.remember_then_zero_signature() {
            Err(Error::Stub(StubError::SignatureAlreadyRecorded)) => {}
            other => other?,
        }

        let ux = graph
            .containers
            .iter()
            .find(|c| c.container_type == ContainerType::Ux && c.size > 0)
            .ok_or_else(|| Error::GenericError("bundle has no UX container".to_string()))?;
        append_container_file(&mut stub, ContainerSlot::Ux, &ux.work_path, ux.size)?;

        for container in graph
            .containers
            .iter()
            .filter(|c| c.container_type == ContainerType::Attached && c.size > 0)
        {
            append_container_file(
                &mut stub,
                ContainerSlot::Attached,
                &container.work_path,
                container.size,
            )?;
        }
        stub.flush()?;
        drop(stub);

        let output_dir = paths.output.parent().unwrap_or_else(|| Path::new("."));
        let mut detached = Vec::new();
        for container in graph
            .containers
            .iter()
            .filter(|c| c.container_type == ContainerType::Detached && c.size > 0)
        {
            let destination = output_dir.join(&container.name);
            fs::copy(&container.work_path, &destination)
                .fs_context("writing detached container", &destination)?;
            detached.push(destination);
        }
        Ok(detached)
    }
}

/// Fills hashes and sizes for payloads whose source exists on disk.
fn resolve_payload_info(graph: &mut SymbolGraph) -> Result<()> {
    for payload in &mut graph.payloads {
        if payload.hash.is_some() || payload.uses_certificate() {
            continue;
        }
        if payload.source_path.is_file() {
            let (size, hash) = sha256_file(&payload.source_path)?;
            payload.file_size = Some(size);
            payload.hash = Some(hash);
        }
    }
    Ok(())
}

/// Embedded payloads that name no container land in the reserved default
/// attached container; the UX container is created when authoring omitted
/// it.
fn assign_default_containers(graph: &mut SymbolGraph) {
    if !graph
        .containers
        .iter()
        .any(|c| c.container_type == ContainerType::Ux)
    {
        graph
            .containers
            .insert(0, ContainerSymbol::new(UX_CONTAINER_ID, ContainerType::Ux));
    }

    let needs_default = graph
        .payloads
        .iter()
        .any(|p| p.packaging == Packaging::Embedded && !p.layout_only && p.container.is_none());
    if needs_default
        && !graph
            .containers
            .iter()
            .any(|c| c.id == DEFAULT_ATTACHED_CONTAINER_ID)
    {
        graph.containers.push(ContainerSymbol::new(
            DEFAULT_ATTACHED_CONTAINER_ID,
            ContainerType::Attached,
        ));
    }
    for payload in &mut graph.payloads {
        if payload.packaging == Packaging::Embedded && !payload.layout_only && payload.container.is_none()
        {
            payload.container = Some(DEFAULT_ATTACHED_CONTAINER_ID.to_string());
        }
    }
}

/// Inserts the three manifest payloads at the head of the payload list so
/// they take the first embedded ids of the UX container.
fn add_manifest_payloads(graph: &mut SymbolGraph, intermediate: &Path) {
    let ux_id = graph
        .containers
        .iter()
        .find(|c| c.container_type == ContainerType::Ux)
        .map(|c| c.id.clone())
        .unwrap_or_else(|| UX_CONTAINER_ID.to_string());

    let entries = [
        (MANIFEST_PAYLOAD_ID, "manifest.xml"),
        (BA_DATA_PAYLOAD_ID, "BootstrapperApplicationData.xml"),
        (EXTENSION_DATA_PAYLOAD_ID, "BootstrapperExtensionData.xml"),
    ];
    for (index, (id, name)) in entries.into_iter().enumerate() {
        if graph.payload(id).is_some() {
            continue;
        }
        let mut payload = PayloadSymbol::new(id, name, intermediate.join(name));
        payload.container = Some(ux_id.clone());
        graph.payloads.insert(index, payload);
    }
}

fn to_container_payloads(graph: &SymbolGraph, container: &ContainerSymbol) -> Vec<ContainerPayload> {
    assigned_payloads(graph, container)
        .into_iter()
        .map(|(embedded_id, payload)| ContainerPayload {
            name: embedded_id,
            source_path: payload.source_path.clone(),
        })
        .collect()
}

fn append_container_file(
    stub: &mut stub::Stub<fs::File>,
    slot: ContainerSlot,
    path: &Path,
    size: u64,
) -> Result<()> {
    let mut file = fs::File::open(path).fs_context("reading packed container", path)?;
    stub.append_container(slot, &mut file, size as u32)?;
    Ok(())
}
