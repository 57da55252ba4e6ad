//! Resource registry and loader.
//!
//! Resources are declared up front with [`Resources::add`] /
//! [`Resources::add_with`], which hand back typed [`Resource`] handles.
//! [`Resources::load_all`] then fetches every declared location
//! concurrently, waits for the whole batch, and only afterwards runs the
//! transforms in registration order. A handle's [`Resource::get`] fails
//! until its final value is published and is a plain accessor from then on.

pub mod fetch;

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use futures::future::try_join_all;
use tracing::{error, info, warn};

use crate::error::{ResourceError, TransformError};
use crate::model::{Asset, ResourceKind, ResourcePhase};

pub use fetch::{Fetch, StaticFetcher};
#[cfg(not(target_arch = "wasm32"))]
pub use fetch::{FileFetcher, FETCH_THREADS};
#[cfg(target_arch = "wasm32")]
pub use fetch::HttpFetcher;

type Value = Rc<dyn Any>;
type Transform = Box<dyn FnOnce(Asset) -> Result<Value, TransformError>>;

enum ResourceState {
    Registered,
    Loading,
    /// Raw asset published; final for resources without a transform.
    Loaded(Value),
    /// Raw asset handed to the transform, result not yet published.
    Transforming,
    Transformed(Value),
    /// The batch failed; nothing from it is published.
    Failed,
}

struct Entry {
    location: String,
    kind: ResourceKind,
    has_transform: bool,
    state: RefCell<ResourceState>,
    transform: RefCell<Option<Transform>>,
}

impl Entry {
    fn phase(&self) -> ResourcePhase {
        match &*self.state.borrow() {
            ResourceState::Registered => ResourcePhase::Registered,
            ResourceState::Loading => ResourcePhase::Loading,
            ResourceState::Loaded(_) | ResourceState::Transforming => ResourcePhase::Loaded,
            ResourceState::Transformed(_) => ResourcePhase::Transformed,
            ResourceState::Failed => ResourcePhase::Failed,
        }
    }

    fn value(&self) -> Option<Value> {
        match &*self.state.borrow() {
            ResourceState::Loaded(value) if !self.has_transform => Some(value.clone()),
            ResourceState::Transformed(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn take_raw(&self) -> Option<Asset> {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), ResourceState::Transforming);
        match previous {
            ResourceState::Loaded(value) => value.downcast::<Asset>().ok().map(Rc::unwrap_or_clone),
            other => {
                *self.state.borrow_mut() = other;
                None
            }
        }
    }

    fn not_loaded(&self) -> ResourceError {
        ResourceError::NotLoaded {
            location: self.location.clone(),
        }
    }
}

/// Typed handle to a registered resource.
pub struct Resource<T> {
    entry: Rc<Entry>,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("location", &self.entry.location)
            .field("kind", &self.entry.kind)
            .field("phase", &self.entry.phase())
            .finish()
    }
}

impl<T: 'static> Resource<T> {
    pub fn location(&self) -> &str {
        &self.entry.location
    }

    pub fn kind(&self) -> ResourceKind {
        self.entry.kind
    }

    pub fn phase(&self) -> ResourcePhase {
        self.entry.phase()
    }

    pub fn is_ready(&self) -> bool {
        self.entry.value().is_some()
    }

    /// The loaded (or transformed) value. Fails with
    /// [`ResourceError::NotLoaded`] until `load_all` has published it.
    pub fn get(&self) -> Result<Rc<T>, ResourceError> {
        self.entry
            .value()
            .and_then(|value| value.downcast::<T>().ok())
            .ok_or_else(|| self.entry.not_loaded())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoaderPhase {
    Setup,
    Loading,
    Ready,
    Failed,
}

/// Owns the list of declared resources and drives their loading.
pub struct Resources {
    entries: Vec<Rc<Entry>>,
    phase: LoaderPhase,
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

impl Resources {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            phase: LoaderPhase::Setup,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.phase == LoaderPhase::Ready
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.location.as_str())
    }

    /// Declare a resource whose value is the raw decoded [`Asset`].
    pub fn add(&mut self, location: &str) -> Result<Resource<Asset>, ResourceError> {
        self.register(location, None)
    }

    /// Declare a resource whose value is `transform(raw)`, computed once
    /// after every resource in the batch has loaded.
    pub fn add_with<T, F>(&mut self, location: &str, transform: F) -> Result<Resource<T>, ResourceError>
    where
        T: 'static,
        F: FnOnce(Asset) -> Result<T, TransformError> + 'static,
    {
        let erased: Transform = Box::new(move |asset| transform(asset).map(|value| Rc::new(value) as Value));
        self.register(location, Some(erased))
    }

    fn register<T>(&mut self, location: &str, transform: Option<Transform>) -> Result<Resource<T>, ResourceError> {
        if self.phase != LoaderPhase::Setup {
            return Err(ResourceError::RegistrationClosed {
                location: location.to_string(),
            });
        }
        let kind = ResourceKind::from_location(location)?;

        let entry = Rc::new(Entry {
            location: location.to_string(),
            kind,
            has_transform: transform.is_some(),
            state: RefCell::new(ResourceState::Registered),
            transform: RefCell::new(transform),
        });
        self.entries.push(entry.clone());

        Ok(Resource {
            entry,
            _value: PhantomData,
        })
    }

    /// Fetch and decode every declared resource concurrently, then apply
    /// transforms in registration order. Fails the whole batch on the first
    /// error, naming the resource responsible. A failed batch publishes
    /// nothing: every handle moves to [`ResourcePhase::Failed`], including
    /// raw values already handed to earlier transforms. Calling it again
    /// after success is a no-op.
    pub async fn load_all<F: Fetch + ?Sized>(&mut self, fetcher: &F) -> Result<(), ResourceError> {
        match self.phase {
            LoaderPhase::Setup => {}
            LoaderPhase::Ready => return Ok(()),
            LoaderPhase::Loading | LoaderPhase::Failed => {
                warn!("load_all called again after an unfinished or failed load");
                return Err(self.first_unready());
            }
        }
        self.phase = LoaderPhase::Loading;

        for entry in &self.entries {
            *entry.state.borrow_mut() = ResourceState::Loading;
        }

        let loads = self.entries.iter().map(|entry| fetch_one(entry, fetcher));
        let assets = match try_join_all(loads).await {
            Ok(assets) => assets,
            Err(err) => {
                error!(location = err.location(), "resource batch failed: {err}");
                self.phase = fail_batch(&self.entries);
                return Err(err);
            }
        };

        for (entry, asset) in self.entries.iter().zip(assets) {
            *entry.state.borrow_mut() = ResourceState::Loaded(Rc::new(asset));
        }

        for entry in &self.entries {
            let Some(transform) = entry.transform.borrow_mut().take() else {
                continue;
            };
            info!("Transforming {}", entry.location);
            let Some(raw) = entry.take_raw() else {
                let err = entry.not_loaded();
                self.phase = fail_batch(&self.entries);
                return Err(err);
            };
            match transform(raw) {
                Ok(value) => *entry.state.borrow_mut() = ResourceState::Transformed(value),
                Err(err) => {
                    let err = transform_failure(&entry.location, err);
                    error!(location = %entry.location, "resource transform failed: {err}");
                    self.phase = fail_batch(&self.entries);
                    return Err(err);
                }
            }
        }

        self.phase = LoaderPhase::Ready;
        info!("All {} resources ready", self.entries.len());
        Ok(())
    }

    fn first_unready(&self) -> ResourceError {
        let location = self
            .entries
            .iter()
            .find(|entry| entry.value().is_none())
            .map(|entry| entry.location.clone())
            .unwrap_or_default();
        ResourceError::NotLoaded { location }
    }
}

async fn fetch_one<F: Fetch + ?Sized>(entry: &Entry, fetcher: &F) -> Result<Asset, ResourceError> {
    let bytes = fetcher
        .fetch(&entry.location)
        .await
        .map_err(|source| ResourceError::Fetch {
            location: entry.location.clone(),
            source,
        })?;
    let asset = Asset::decode(entry.kind, &bytes).map_err(|reason| ResourceError::Decode {
        location: entry.location.clone(),
        reason,
    })?;
    info!("Loaded {}", entry.location);
    Ok(asset)
}

/// Retract everything the batch published and drop pending transforms.
fn fail_batch(entries: &[Rc<Entry>]) -> LoaderPhase {
    for entry in entries {
        *entry.state.borrow_mut() = ResourceState::Failed;
        entry.transform.borrow_mut().take();
    }
    LoaderPhase::Failed
}

fn transform_failure(location: &str, err: TransformError) -> ResourceError {
    match err {
        TransformError::KindMismatch { expected, found } => ResourceError::KindMismatch {
            location: location.to_string(),
            expected,
            found,
        },
        other => ResourceError::Transform {
            location: location.to_string(),
            source: Box::new(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::Cursor;
    use std::task::Poll;

    use futures::executor::block_on;
    use futures::future::{poll_fn, LocalBoxFuture};
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    use super::*;
    use crate::error::FetchError;
    use crate::model::asset::tests::MINIMAL_GLTF;
    use crate::model::ModelData;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn fixture() -> StaticFetcher {
        StaticFetcher::new()
            .with("a.png", png_bytes(4, 2))
            .with("c.glb", MINIMAL_GLTF.as_bytes().to_vec())
            .with("shader.frag", "void main() {}")
    }

    /// Serves `slow` only after every other location in the batch finished,
    /// logging each completed fetch.
    struct StaggeredFetcher {
        files: StaticFetcher,
        slow: &'static str,
        batch: usize,
        finished: Cell<usize>,
        stalls: Cell<usize>,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl StaggeredFetcher {
        fn new(slow: &'static str, batch: usize, log: Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                files: fixture(),
                slow,
                batch,
                finished: Cell::new(0),
                stalls: Cell::new(0),
                log,
            }
        }
    }

    impl Fetch for StaggeredFetcher {
        fn fetch<'a>(&'a self, location: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
            Box::pin(async move {
                if location == self.slow {
                    poll_fn(|cx| {
                        if self.finished.get() + 1 < self.batch {
                            self.stalls.set(self.stalls.get() + 1);
                            cx.waker().wake_by_ref();
                            Poll::Pending
                        } else {
                            Poll::Ready(())
                        }
                    })
                    .await;
                }
                let bytes = self.files.fetch(location).await;
                self.finished.set(self.finished.get() + 1);
                self.log.borrow_mut().push(format!("fetched {location}"));
                bytes
            })
        }
    }

    #[test]
    fn get_fails_until_load_all_completes() {
        let mut resources = Resources::new();
        let texture = resources.add("a.png").unwrap();
        let shader = resources.add("shader.frag").unwrap();

        assert_eq!(texture.kind(), ResourceKind::Texture);
        assert!(matches!(texture.get(), Err(ResourceError::NotLoaded { .. })));
        assert_eq!(shader.phase(), ResourcePhase::Registered);

        block_on(resources.load_all(&fixture())).unwrap();

        assert!(resources.is_ready());
        let image = texture.get().unwrap();
        assert_eq!(image.as_texture().map(|t| (t.width(), t.height())), Some((4, 2)));
        assert_eq!(shader.get().unwrap().as_text(), Some("void main() {}"));
        assert_eq!(shader.phase(), ResourcePhase::Loaded);
    }

    #[test]
    fn get_is_stable_after_load() {
        let mut resources = Resources::new();
        let shader = resources.add("shader.frag").unwrap();
        block_on(resources.load_all(&fixture())).unwrap();

        let first = shader.get().unwrap();
        let second = shader.get().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_extension_fails_registration() {
        let mut resources = Resources::new();
        let err = resources.add("b.xyz").unwrap_err();
        assert!(matches!(err, ResourceError::UnrecognizedType { .. }));
        assert!(resources.is_empty());
    }

    #[test]
    fn transform_result_is_published_and_computed_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();

        let mut resources = Resources::new();
        let names = resources
            .add_with("c.glb", move |asset| {
                counter.set(counter.get() + 1);
                let model: ModelData = asset.into_model()?;
                Ok(model.nodes.iter().map(|n| n.name.clone()).collect::<Vec<_>>())
            })
            .unwrap();

        assert!(names.get().is_err());
        block_on(resources.load_all(&fixture())).unwrap();

        assert_eq!(*names.get().unwrap(), vec!["Room".to_string(), "sunblock".to_string()]);
        assert_eq!(*names.get().unwrap(), vec!["Room".to_string(), "sunblock".to_string()]);
        assert_eq!(calls.get(), 1);
        assert_eq!(names.phase(), ResourcePhase::Transformed);
    }

    #[test]
    fn transforms_see_every_raw_load_and_earlier_transforms() {
        let mut resources = Resources::new();
        let texture = resources.add("a.png").unwrap();
        let width = {
            let texture = texture.clone();
            resources
                .add_with("c.glb", move |_model| {
                    let image = texture.get()?;
                    Ok(image.as_texture().map(|t| t.width()).unwrap_or(0))
                })
                .unwrap()
        };
        let doubled = {
            let width = width.clone();
            resources
                .add_with("shader.frag", move |_| Ok(*width.get()? * 2))
                .unwrap()
        };

        block_on(resources.load_all(&fixture())).unwrap();

        assert_eq!(*width.get().unwrap(), 4);
        assert_eq!(*doubled.get().unwrap(), 8);
    }

    #[test]
    fn failed_fetch_fails_batch_and_names_resource() {
        let mut resources = Resources::new();
        let texture = resources.add("a.png").unwrap();
        resources.add("missing.jpg").unwrap();

        let err = block_on(resources.load_all(&fixture())).unwrap_err();

        assert!(matches!(err, ResourceError::Fetch { ref location, .. } if location == "missing.jpg"));
        // Nothing is published when the batch fails.
        assert!(texture.get().is_err());
        assert_eq!(texture.phase(), ResourcePhase::Failed);
        assert!(!resources.is_ready());
        assert!(block_on(resources.load_all(&fixture())).is_err());
    }

    #[test]
    fn undecodable_bytes_fail_batch() {
        let fetcher = StaticFetcher::new().with("broken.png", b"nope".to_vec());
        let mut resources = Resources::new();
        resources.add("broken.png").unwrap();

        let err = block_on(resources.load_all(&fetcher)).unwrap_err();
        assert!(matches!(err, ResourceError::Decode { ref location, .. } if location == "broken.png"));
    }

    #[test]
    fn transform_kind_mismatch_is_reported_with_location() {
        let mut resources = Resources::new();
        resources.add_with("shader.frag", |asset| asset.into_texture()).unwrap();

        let err = block_on(resources.load_all(&fixture())).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::KindMismatch { ref location, expected: ResourceKind::Texture, found: ResourceKind::Text }
                if location == "shader.frag"
        ));
    }

    #[test]
    fn failed_transform_retracts_the_whole_batch() {
        let later_ran = Rc::new(Cell::new(false));

        let mut resources = Resources::new();
        let raw = resources.add("raw.frag").unwrap();
        let bad = resources.add_with("bad.vert", |asset| asset.into_texture()).unwrap();
        let later = {
            let later_ran = later_ran.clone();
            resources
                .add_with("later.glsl", move |asset| {
                    later_ran.set(true);
                    Ok(asset.as_text().map(str::len).unwrap_or(0))
                })
                .unwrap()
        };
        let fetcher = StaticFetcher::new()
            .with("raw.frag", "void main() {}")
            .with("bad.vert", "void main() {}")
            .with("later.glsl", "float x;");

        let err = block_on(resources.load_all(&fetcher)).unwrap_err();

        assert!(matches!(err, ResourceError::KindMismatch { ref location, .. } if location == "bad.vert"));
        assert!(!later_ran.get());
        assert!(matches!(raw.get(), Err(ResourceError::NotLoaded { .. })));
        assert!(bad.get().is_err());
        assert!(later.get().is_err());
        for phase in [raw.phase(), bad.phase(), later.phase()] {
            assert_eq!(phase, ResourcePhase::Failed);
        }
        assert!(!resources.is_ready());
        assert!(block_on(resources.load_all(&fetcher)).is_err());
        assert!(raw.get().is_err());
    }

    #[test]
    fn transforms_wait_for_the_slowest_fetch() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let later_slot: Rc<RefCell<Option<Resource<Asset>>>> = Rc::new(RefCell::new(None));

        let mut resources = Resources::new();
        let texture = resources.add("a.png").unwrap();
        let summary = {
            let log = log.clone();
            let later_slot = later_slot.clone();
            resources
                .add_with("c.glb", move |_model| {
                    log.borrow_mut().push("transform c.glb".to_string());
                    let width = texture.get()?.as_texture().map(|t| t.width()).unwrap_or(0);
                    // Registered after this resource.
                    let later = later_slot.borrow().clone().ok_or(TransformError::KindMismatch {
                        expected: ResourceKind::Text,
                        found: ResourceKind::Model,
                    })?;
                    let shader_len = later.get()?.as_text().map(str::len).unwrap_or(0);
                    Ok((width, shader_len))
                })
                .unwrap()
        };
        *later_slot.borrow_mut() = Some(resources.add("shader.frag").unwrap());

        let fetcher = StaggeredFetcher::new("a.png", resources.len(), log.clone());
        block_on(resources.load_all(&fetcher)).unwrap();

        assert!(fetcher.stalls.get() > 0);
        assert_eq!(
            *log.borrow(),
            ["fetched c.glb", "fetched shader.frag", "fetched a.png", "transform c.glb"]
        );
        assert_eq!(*summary.get().unwrap(), (4, "void main() {}".len()));
    }

    #[test]
    fn registration_closes_once_loading_starts() {
        let mut resources = Resources::new();
        resources.add("shader.frag").unwrap();
        block_on(resources.load_all(&fixture())).unwrap();

        let err = resources.add("a.png").unwrap_err();
        assert!(matches!(err, ResourceError::RegistrationClosed { .. }));
        // A second load after success does nothing.
        block_on(resources.load_all(&fixture())).unwrap();
    }

    #[test]
    fn independent_loaders_do_not_share_state() {
        let mut first = Resources::new();
        let mut second = Resources::new();
        let a = first.add("shader.frag").unwrap();
        let b = second.add("shader.frag").unwrap();

        block_on(first.load_all(&fixture())).unwrap();

        assert!(a.get().is_ok());
        assert!(b.get().is_err());
        assert_eq!(second.locations().collect::<Vec<_>>(), ["shader.frag"]);
    }
}
