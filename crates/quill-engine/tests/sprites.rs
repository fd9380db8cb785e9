//! Sprite transforms and draw submission.

mod common;

use std::rc::Rc;

use glam::Vec2;

use quill_engine::coords::Viewport;
use quill_engine::driver::{FilterMode, HeadlessDriver, WrapMode};
use quill_engine::render::{QUAD_VERTICES, ShaderProgram, Sprite, SpriteError, Texture2D, transform_point};

use common::{SPRITE_FRAGMENT, SPRITE_VERTEX, assert_close};

fn texture(driver: &HeadlessDriver) -> Rc<Texture2D<'_>> {
    Rc::new(Texture2D::new(
        driver,
        32,
        32,
        &vec![128; 32 * 32 * 4],
        4,
        FilterMode::Nearest,
        WrapMode::ClampToEdge,
    ))
}

fn program(driver: &HeadlessDriver) -> Rc<ShaderProgram<'_>> {
    Rc::new(ShaderProgram::new(driver, SPRITE_VERTEX, SPRITE_FRAGMENT).unwrap())
}

#[test]
fn unrotated_sprite_covers_its_rectangle() {
    common::init();
    let driver = HeadlessDriver::new();
    let sprite = Sprite::new(
        texture(&driver),
        program(&driver),
        "",
        Vec2::new(300.0, 100.0),
        Vec2::new(100.0, 100.0),
        0.0,
    )
    .unwrap();

    let m = sprite.model_matrix();
    assert_close(transform_point(&m, Vec2::new(0.0, 0.0)), Vec2::new(300.0, 100.0));
    assert_close(transform_point(&m, Vec2::new(1.0, 0.0)), Vec2::new(400.0, 100.0));
    assert_close(transform_point(&m, Vec2::new(1.0, 1.0)), Vec2::new(400.0, 200.0));
    assert_close(transform_point(&m, Vec2::new(0.0, 1.0)), Vec2::new(300.0, 200.0));
}

#[test]
fn rotation_keeps_center_fixed() {
    common::init();
    let driver = HeadlessDriver::new();
    let sprite = Sprite::new(
        texture(&driver),
        program(&driver),
        "",
        Vec2::new(300.0, 100.0),
        Vec2::new(100.0, 50.0),
        0.0,
    )
    .unwrap();

    for degrees in [0.0, 30.0, 90.0, 180.0, 275.0] {
        sprite.set_rotation(degrees);
        let m = sprite.model_matrix();
        assert_close(transform_point(&m, Vec2::splat(0.5)), Vec2::new(350.0, 125.0));
    }

    sprite.set_rotation(180.0);
    let m = sprite.model_matrix();
    assert_close(transform_point(&m, Vec2::ZERO), Vec2::new(400.0, 150.0));
}

#[test]
fn moving_a_shared_sprite_changes_the_next_draw() {
    common::init();
    let driver = HeadlessDriver::new();
    let sprite = Rc::new(Sprite::new(
        texture(&driver),
        program(&driver),
        "",
        Vec2::ZERO,
        Vec2::splat(10.0),
        0.0,
    )
    .unwrap());
    let alias = Rc::clone(&sprite);

    sprite.render();
    alias.set_position(Vec2::new(5.0, 7.0));
    sprite.render();

    let draws = driver.take_draws();
    assert_eq!(draws.len(), 2);
    let first = draws[0].mat4("model").unwrap();
    let second = draws[1].mat4("model").unwrap();
    assert_close(transform_point(&first, Vec2::ZERO), Vec2::ZERO);
    assert_close(transform_point(&second, Vec2::ZERO), Vec2::new(5.0, 7.0));
    assert_eq!(sprite.position(), Vec2::new(5.0, 7.0));
}

#[test]
fn sprite_uvs_follow_initial_sub_texture() {
    common::init();
    let driver = HeadlessDriver::new();
    let tex = texture(&driver);
    tex.add_sub_texture("corner", Vec2::new(0.5, 0.5), Vec2::ONE);

    let sprite = Sprite::new(tex, program(&driver), "corner", Vec2::ZERO, Vec2::ONE, 0.0).unwrap();
    sprite.render();

    let draw = &driver.draws()[0];
    assert_eq!(draw.positions, QUAD_VERTICES.to_vec());
    assert_eq!(draw.uvs[0], Vec2::new(0.5, 0.5));
    assert_eq!(draw.uvs[2], Vec2::ONE);
    assert_eq!(draw.uvs[4], Vec2::new(1.0, 0.5));
}

#[test]
fn projection_set_by_the_application_reaches_the_draw() {
    common::init();
    let driver = HeadlessDriver::new();
    let program = program(&driver);
    let projection = Viewport::new(640.0, 480.0).projection();

    program.use_program();
    program.set_matrix4("projection", &projection);

    let sprite = Sprite::new(texture(&driver), program, "", Vec2::ZERO, Vec2::ONE, 0.0).unwrap();
    sprite.render();

    assert_eq!(driver.draws()[0].mat4("projection"), Some(projection));
    assert!(driver.errors().is_empty(), "{:?}", driver.errors());
}

#[test]
fn unlinked_program_skips_the_draw() {
    common::init();
    let driver = HeadlessDriver::new();
    let unlinked =
        Rc::new(ShaderProgram::new(&driver, SPRITE_VERTEX, common::MISMATCHED_FRAGMENT).unwrap());

    let sprite = Sprite::new(texture(&driver), unlinked, "", Vec2::ZERO, Vec2::ONE, 0.0).unwrap();
    sprite.render();

    assert!(driver.draws().is_empty());
    assert!(!driver.has_bound_program());
    assert!(driver.errors().is_empty());
}

#[test]
fn sprite_refuses_a_texture_from_another_driver() {
    common::init();
    let driver = HeadlessDriver::new();
    let other = HeadlessDriver::new();

    let err = Sprite::new(texture(&other), program(&driver), "", Vec2::ZERO, Vec2::ONE, 0.0)
        .unwrap_err();

    assert_eq!(err, SpriteError::DriverMismatch);
    assert_eq!(driver.live_counts().geometry, 0);
    assert_eq!(other.live_counts().geometry, 0);
}

#[test]
fn quad_lives_on_the_program_driver() {
    common::init();
    let driver = HeadlessDriver::new();

    let sprite = Sprite::new(texture(&driver), program(&driver), "", Vec2::ZERO, Vec2::ONE, 0.0)
        .unwrap();
    assert_eq!(driver.live_counts().geometry, 1);

    drop(sprite);
    assert_eq!(driver.live_counts().geometry, 0);
}
