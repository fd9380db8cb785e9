use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use glam::Vec2;

use crate::driver::Driver;
use crate::render::{ShaderProgram, Sprite, Texture2D, tile_sub_textures};

use super::assets::{AssetReader, FsAssets, ImageCrateDecoder, ImageDecoder};
use super::config::{DuplicatePolicy, RegistryConfig};
use super::error::{ResourceError, ResourceKind};

/// Named, shared GPU resources.
///
/// Programs, textures and sprites are registered under string names and
/// handed out as `Rc`s. Everything here borrows the driver for `'d`, so the
/// driver cannot be dropped while the registry or anything it returned is
/// still alive.
pub struct ResourceRegistry<'d> {
    driver: &'d dyn Driver,
    config: RegistryConfig,
    assets: Box<dyn AssetReader>,
    decoder: Box<dyn ImageDecoder>,

    programs: HashMap<String, Rc<ShaderProgram<'d>>>,
    textures: HashMap<String, Rc<Texture2D<'d>>>,
    sprites: HashMap<String, Rc<Sprite<'d>>>,
}

fn logged(err: ResourceError) -> ResourceError {
    log::error!("{err}");
    err
}

fn lookup<T>(
    map: &HashMap<String, Rc<T>>,
    kind: ResourceKind,
    name: &str,
) -> Option<Rc<T>> {
    let found = map.get(name).cloned();
    if found.is_none() {
        log::warn!("no {kind} named `{name}`");
    }
    found
}

fn sorted_names<T>(map: &HashMap<String, T>) -> Vec<String> {
    let mut names: Vec<String> = map.keys().cloned().collect();
    names.sort();
    names
}

impl<'d> ResourceRegistry<'d> {
    /// Reads files below `config.resource_root` and decodes images with the
    /// `image` crate.
    pub fn new(driver: &'d dyn Driver, config: RegistryConfig) -> Self {
        let assets = FsAssets::new(config.resource_root.clone());
        Self::with_sources(driver, config, assets, ImageCrateDecoder)
    }

    pub fn with_sources(
        driver: &'d dyn Driver,
        config: RegistryConfig,
        assets: impl AssetReader + 'static,
        decoder: impl ImageDecoder + 'static,
    ) -> Self {
        Self {
            driver,
            config,
            assets: Box::new(assets),
            decoder: Box::new(decoder),
            programs: HashMap::new(),
            textures: HashMap::new(),
            sprites: HashMap::new(),
        }
    }

    #[inline]
    pub fn driver(&self) -> &'d dyn Driver {
        self.driver
    }

    #[inline]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn check_free(&self, kind: ResourceKind, name: &str) -> Result<(), ResourceError> {
        let taken = match kind {
            ResourceKind::Program => self.programs.contains_key(name),
            ResourceKind::Texture => self.textures.contains_key(name),
            ResourceKind::Sprite => self.sprites.contains_key(name),
        };
        match (taken, self.config.duplicates) {
            (true, DuplicatePolicy::Reject) => Err(logged(ResourceError::Duplicate {
                kind,
                name: name.to_owned(),
            })),
            (true, DuplicatePolicy::Replace) => {
                log::debug!("replacing {kind} `{name}`");
                Ok(())
            }
            (false, _) => Ok(()),
        }
    }

    /// Reads a whole file. Empty files are an error.
    fn read_file(&self, relative_path: &str) -> Result<Vec<u8>, ResourceError> {
        let path = self.assets.describe(relative_path);
        let bytes = self
            .assets
            .read(relative_path)
            .map_err(|source| logged(ResourceError::Io { path: path.clone(), source }))?;
        if bytes.is_empty() {
            return Err(logged(ResourceError::EmptyFile { path }));
        }
        Ok(bytes)
    }

    fn read_text(&self, relative_path: &str) -> Result<String, ResourceError> {
        let bytes = self.read_file(relative_path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads both stage files, builds the program and registers it.
    ///
    /// Read and compile failures register nothing. A program that compiled but
    /// failed to link is registered anyway and reported as
    /// [`ResourceError::Link`].
    pub fn load_program(
        &mut self,
        name: &str,
        vertex_path: &str,
        fragment_path: &str,
    ) -> Result<Rc<ShaderProgram<'d>>, ResourceError> {
        self.check_free(ResourceKind::Program, name)?;

        let vertex_source = self.read_text(vertex_path)?;
        let fragment_source = self.read_text(fragment_path)?;

        let program = ShaderProgram::new(self.driver, &vertex_source, &fragment_source)
            .map_err(|source| {
                logged(ResourceError::Shader { name: name.to_owned(), source })
            })?;

        let link_log = program.link_log().map(str::to_owned);
        let program = Rc::new(program);
        self.programs.insert(name.to_owned(), program.clone());

        match link_log {
            None => {
                log::info!("loaded shader program `{name}` ({vertex_path}, {fragment_path})");
                Ok(program)
            }
            Some(log) => Err(logged(ResourceError::Link { name: name.to_owned(), log })),
        }
    }

    pub fn get_program(&self, name: &str) -> Option<Rc<ShaderProgram<'d>>> {
        lookup(&self.programs, ResourceKind::Program, name)
    }

    pub fn contains_program(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn program_names(&self) -> Vec<String> {
        sorted_names(&self.programs)
    }

    /// Drops the registry's reference. Sprites using the program keep it alive.
    pub fn remove_program(&mut self, name: &str) -> Option<Rc<ShaderProgram<'d>>> {
        self.programs.remove(name)
    }

    /// Reads and decodes an image (bottom row first) and registers it as a
    /// texture with the configured filter and wrap modes.
    pub fn load_texture(
        &mut self,
        name: &str,
        path: &str,
    ) -> Result<Rc<Texture2D<'d>>, ResourceError> {
        self.check_free(ResourceKind::Texture, name)?;

        let bytes = self.read_file(path)?;
        let image = self.decoder.decode(&bytes).map_err(|reason| {
            logged(ResourceError::Decode { path: self.assets.describe(path), reason })
        })?;

        let texture = Rc::new(Texture2D::new(
            self.driver,
            image.width,
            image.height,
            &image.pixels,
            image.channels,
            self.config.texture_filter,
            self.config.texture_wrap,
        ));
        log::info!(
            "loaded texture `{name}` from {path} ({}x{}, {} channels)",
            image.width,
            image.height,
            image.channels
        );

        self.textures.insert(name.to_owned(), texture.clone());
        Ok(texture)
    }

    /// [`Self::load_texture`], then assigns `sub_texture_names` to
    /// `tile_width` x `tile_height` tiles, row-major from the top-left.
    pub fn load_texture_atlas<S: AsRef<str>>(
        &mut self,
        name: &str,
        path: &str,
        sub_texture_names: &[S],
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Rc<Texture2D<'d>>, ResourceError> {
        let texture = self.load_texture(name, path)?;
        tile_sub_textures(&texture, sub_texture_names, tile_width, tile_height);
        Ok(texture)
    }

    pub fn get_texture(&self, name: &str) -> Option<Rc<Texture2D<'d>>> {
        lookup(&self.textures, ResourceKind::Texture, name)
    }

    pub fn contains_texture(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    pub fn texture_names(&self) -> Vec<String> {
        sorted_names(&self.textures)
    }

    /// Drops the registry's reference. Sprites using the texture keep it alive.
    pub fn remove_texture(&mut self, name: &str) -> Option<Rc<Texture2D<'d>>> {
        self.textures.remove(name)
    }

    /// Builds a sprite at the origin from a registered texture and linked
    /// program and registers it.
    pub fn load_sprite(
        &mut self,
        name: &str,
        texture_name: &str,
        program_name: &str,
        width: u32,
        height: u32,
        initial_sub_texture: &str,
    ) -> Result<Rc<Sprite<'d>>, ResourceError> {
        self.check_free(ResourceKind::Sprite, name)?;

        let texture = self.textures.get(texture_name).cloned().ok_or_else(|| {
            logged(ResourceError::Lookup {
                kind: ResourceKind::Texture,
                name: texture_name.to_owned(),
            })
        })?;
        let program = self.programs.get(program_name).cloned().ok_or_else(|| {
            logged(ResourceError::Lookup {
                kind: ResourceKind::Program,
                name: program_name.to_owned(),
            })
        })?;
        if !program.is_linked() {
            return Err(logged(ResourceError::Unlinked { name: program_name.to_owned() }));
        }

        let sprite = Sprite::new(
            texture,
            program,
            initial_sub_texture,
            Vec2::ZERO,
            Vec2::new(width as f32, height as f32),
            0.0,
        )
        .map_err(|source| logged(ResourceError::Sprite { name: name.to_owned(), source }))?;
        let sprite = Rc::new(sprite);
        log::debug!("created sprite `{name}` ({texture_name}, {program_name}, {width}x{height})");

        self.sprites.insert(name.to_owned(), sprite.clone());
        Ok(sprite)
    }

    pub fn get_sprite(&self, name: &str) -> Option<Rc<Sprite<'d>>> {
        lookup(&self.sprites, ResourceKind::Sprite, name)
    }

    pub fn contains_sprite(&self, name: &str) -> bool {
        self.sprites.contains_key(name)
    }

    pub fn sprite_names(&self) -> Vec<String> {
        sorted_names(&self.sprites)
    }

    /// Drops the registry's reference; the geometry is released once no other
    /// holder remains.
    pub fn remove_sprite(&mut self, name: &str) -> Option<Rc<Sprite<'d>>> {
        self.sprites.remove(name)
    }
}

impl fmt::Debug for ResourceRegistry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("config", &self.config)
            .field("programs", &self.program_names())
            .field("textures", &self.texture_names())
            .field("sprites", &self.sprite_names())
            .finish()
    }
}
