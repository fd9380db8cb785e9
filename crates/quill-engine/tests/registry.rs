//! Registry load/lookup orchestration.

mod common;

use std::rc::Rc;

use glam::Vec2;

use quill_engine::driver::{FilterMode, HeadlessDriver, WrapMode};
use quill_engine::resources::{
    DuplicatePolicy, RegistryConfig, ResourceError, ResourceKind, ResourceRegistry,
};

const VERT: &str = "res/shaders/sprite.vert.wgsl";
const FRAG: &str = "res/shaders/sprite.frag.wgsl";

fn loaded(driver: &HeadlessDriver, config: RegistryConfig) -> ResourceRegistry<'_> {
    let mut registry = common::registry_with(driver, config);
    registry.load_program("sprite", VERT, FRAG).unwrap();
    registry
        .load_texture_atlas(
            "tiles",
            "res/textures/atlas.png",
            &["grass", "water", "sand", "rock", "lava", "snow"],
            16,
            16,
        )
        .unwrap();
    registry
}

#[test]
fn registered_resources_are_returned_by_identity() {
    common::init();
    let driver = HeadlessDriver::new();
    let mut registry = loaded(&driver, RegistryConfig::default());

    let sprite = registry
        .load_sprite("hero", "tiles", "sprite", 100, 50, "water")
        .unwrap();

    assert!(Rc::ptr_eq(&sprite, &registry.get_sprite("hero").unwrap()));
    assert!(Rc::ptr_eq(sprite.texture(), &registry.get_texture("tiles").unwrap()));
    assert!(Rc::ptr_eq(sprite.program(), &registry.get_program("sprite").unwrap()));
    assert_eq!(sprite.position(), Vec2::ZERO);
    assert_eq!(sprite.size(), Vec2::new(100.0, 50.0));
    assert_eq!(sprite.rotation(), 0.0);
}

#[test]
fn lookups_of_unknown_names_are_none() {
    common::init();
    let driver = HeadlessDriver::new();
    let registry = loaded(&driver, RegistryConfig::default());

    assert!(registry.get_program("nope").is_none());
    assert!(registry.get_texture("nope").is_none());
    assert!(registry.get_sprite("nope").is_none());
}

#[test]
fn compile_failure_registers_nothing() {
    common::init();
    let driver = HeadlessDriver::new();
    let mut registry = common::registry_with(&driver, RegistryConfig::default());

    let err = registry
        .load_program("bad", "res/shaders/sprite.frag.wgsl", FRAG)
        .unwrap_err();

    assert!(matches!(err, ResourceError::Shader { .. }), "{err}");
    assert!(!registry.contains_program("bad"));
    assert_eq!(driver.live_counts(), Default::default());
}

#[test]
fn link_failure_registers_unlinked_program() {
    common::init();
    let driver = HeadlessDriver::new();
    let mut registry = common::registry_with(&driver, RegistryConfig::default());

    let err = registry
        .load_program("mismatch", VERT, "res/shaders/broken.frag.wgsl")
        .unwrap_err();

    assert!(matches!(err, ResourceError::Link { .. }), "{err}");
    let program = registry.get_program("mismatch").unwrap();
    assert!(!program.is_linked());
}

#[test]
fn empty_or_missing_shader_files_fail() {
    common::init();
    let driver = HeadlessDriver::new();
    let mut registry = common::registry_with(&driver, RegistryConfig::default());

    let empty = registry
        .load_program("p", VERT, "res/shaders/empty.wgsl")
        .unwrap_err();
    let missing = registry
        .load_program("p", "res/shaders/missing.wgsl", FRAG)
        .unwrap_err();

    assert!(matches!(empty, ResourceError::EmptyFile { .. }));
    assert!(matches!(missing, ResourceError::Io { .. }));
    assert!(registry.program_names().is_empty());
}

#[test]
fn undecodable_texture_fails() {
    common::init();
    let driver = HeadlessDriver::new();
    let mut registry = common::registry_with(&driver, RegistryConfig::default());

    let err = registry.load_texture("t", VERT).unwrap_err();

    assert!(matches!(err, ResourceError::Decode { .. }));
    assert!(!registry.contains_texture("t"));
    assert_eq!(driver.live_counts().textures, 0);
}

#[test]
fn sprite_needs_registered_texture_and_linked_program() {
    common::init();
    let driver = HeadlessDriver::new();
    let mut registry = loaded(&driver, RegistryConfig::default());
    let _ = registry.load_program("mismatch", VERT, "res/shaders/broken.frag.wgsl");

    let no_texture = registry
        .load_sprite("s", "missing", "sprite", 1, 1, "")
        .unwrap_err();
    let no_program = registry
        .load_sprite("s", "tiles", "missing", 1, 1, "")
        .unwrap_err();
    let unlinked = registry
        .load_sprite("s", "tiles", "mismatch", 1, 1, "")
        .unwrap_err();

    assert!(matches!(
        no_texture,
        ResourceError::Lookup { kind: ResourceKind::Texture, .. }
    ));
    assert!(matches!(
        no_program,
        ResourceError::Lookup { kind: ResourceKind::Program, .. }
    ));
    assert!(matches!(unlinked, ResourceError::Unlinked { .. }));
    assert!(registry.sprite_names().is_empty());
    assert_eq!(driver.live_counts().geometry, 0);
}

#[test]
fn duplicates_are_rejected_by_default() {
    common::init();
    let driver = HeadlessDriver::new();
    let mut registry = loaded(&driver, RegistryConfig::default());
    let original = registry.get_texture("tiles").unwrap();

    let err = registry
        .load_texture("tiles", "res/textures/opaque.png")
        .unwrap_err();

    assert!(matches!(
        err,
        ResourceError::Duplicate { kind: ResourceKind::Texture, .. }
    ));
    assert!(Rc::ptr_eq(&original, &registry.get_texture("tiles").unwrap()));
    assert_eq!(driver.live_counts().textures, 1);
}

#[test]
fn replace_policy_swaps_the_entry() {
    common::init();
    let driver = HeadlessDriver::new();
    let config = RegistryConfig {
        duplicates: DuplicatePolicy::Replace,
        ..RegistryConfig::default()
    };
    let mut registry = loaded(&driver, config);
    let original = registry.get_texture("tiles").unwrap();

    let replacement = registry
        .load_texture("tiles", "res/textures/opaque.png")
        .unwrap();

    assert!(!Rc::ptr_eq(&original, &replacement));
    assert!(Rc::ptr_eq(&replacement, &registry.get_texture("tiles").unwrap()));

    // The old texture lives exactly as long as its last holder.
    assert_eq!(driver.live_counts().textures, 2);
    drop(original);
    assert_eq!(driver.live_counts().textures, 1);
}

#[test]
fn configured_sampler_state_reaches_the_driver() {
    common::init();
    let driver = HeadlessDriver::new();
    let config = RegistryConfig {
        texture_filter: FilterMode::Nearest,
        texture_wrap: WrapMode::Repeat,
        ..RegistryConfig::default()
    };
    let mut registry = common::registry_with(&driver, config);

    let texture = registry.load_texture("t", "res/textures/opaque.png").unwrap();

    let desc = driver.texture_descriptor(&texture).unwrap();
    assert_eq!(desc.filter, FilterMode::Nearest);
    assert_eq!(desc.wrap, WrapMode::Repeat);
}

#[test]
fn removed_sprite_releases_geometry_when_last_holder_drops() {
    common::init();
    let driver = HeadlessDriver::new();
    let mut registry = loaded(&driver, RegistryConfig::default());
    registry.load_sprite("a", "tiles", "sprite", 8, 8, "grass").unwrap();

    let held = registry.remove_sprite("a").unwrap();
    assert!(registry.get_sprite("a").is_none());
    assert_eq!(driver.live_counts().geometry, 1);

    drop(held);
    assert_eq!(driver.live_counts().geometry, 0);
}

#[test]
fn dropping_the_registry_releases_everything() {
    common::init();
    let driver = HeadlessDriver::new();
    {
        let mut registry = loaded(&driver, RegistryConfig::default());
        registry.load_sprite("a", "tiles", "sprite", 8, 8, "grass").unwrap();
        registry.load_sprite("b", "tiles", "sprite", 8, 8, "rock").unwrap();
        registry.get_sprite("a").unwrap().render();
        registry.get_sprite("b").unwrap().render();
        assert_eq!(driver.draws().len(), 2);
    }

    assert_eq!(driver.live_counts(), Default::default());
    assert!(driver.errors().is_empty(), "{:?}", driver.errors());
}
