use bundle_repack::config::RepackConfig;
use bundle_repack::container::{ClassId, Field, MemoryContainer};
use bundle_repack::types::RawRef;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SCENE_BUNDLE: &str = "scenes/tut_01.bundle";
pub const SHARED_BUNDLE: &str = "shared/materials.bundle";
pub const SHARED_ORIGIN: &str = "archive:/CAB-SHARED/CAB-SHARED";

/// Object in the shared container the scene points at
pub const E1: i64 = 500;

pub fn write_container(bundle_dir: &Path, key: &str, container: &MemoryContainer) {
    let path = bundle_dir.join(key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, container.to_json_string().unwrap()).unwrap();
}

/// `Root` with `Child1` (script pointing at E1 in the shared container) and `Child2`.
pub fn scene_container() -> MemoryContainer {
    let mut scene = MemoryContainer::new("CAB-SCENE");
    scene.add_external(SHARED_ORIGIN);
    scene
        .insert_game_object(1, "Root", &[2])
        .insert_transform(2, 1, 0, &[4, 6])
        .insert_game_object(3, "Child1", &[4, 7])
        .insert_transform(4, 3, 2, &[])
        .insert_game_object(5, "Child2", &[6])
        .insert_transform(6, 5, 2, &[])
        .insert_component(
            7,
            ClassId(114),
            3,
            vec![Field::reference("m_Material", "Material", RawRef::new(1, E1))],
        );
    scene
}

pub fn shared_container() -> MemoryContainer {
    let mut shared = MemoryContainer::new("CAB-SHARED");
    shared
        .insert_game_object(1, "Palette", &[2])
        .insert_transform(2, 1, 0, &[]);
    shared
}

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Bundle directory holding the scene and shared containers
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let fixture = Self { dir };
        write_container(&fixture.bundle_dir(), SCENE_BUNDLE, &scene_container());
        write_container(&fixture.bundle_dir(), SHARED_BUNDLE, &shared_container());
        fixture
    }

    pub fn bundle_dir(&self) -> PathBuf {
        self.dir.path().join("bundles")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn config(&self) -> RepackConfig {
        let mut config = RepackConfig::default();
        config.paths.bundle_dir = self.bundle_dir();
        config.paths.cache_dir = self.cache_dir();
        config.paths.output_dir = self.output_dir();
        config.versions.content_version = "1.0.28324".to_string();
        config
    }
}
