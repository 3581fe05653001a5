//! Asset fetch capability: shader source text and cubemap face images.
//!
//! The renderer consumes assets through the [`AssetSource`] trait, never by
//! touching the filesystem itself; [`FsAssets`] is the shipped
//! implementation. The six cubemap faces are fetched in parallel and joined
//! by an all-complete barrier; any single failure aborts the whole fetch
//! with a typed error rather than leaving a partial cubemap.

use image::RgbaImage;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};

/// Fixed path of the vertex-stage shader source, relative to the asset root.
pub const VERTEX_SHADER_PATH: &str = "shaders/raymarch.vert.wgsl";
/// Fixed path of the fragment-stage shader source.
pub const FRAGMENT_SHADER_PATH: &str = "shaders/raymarch.frag.wgsl";

/// Errors from asset fetching and decoding.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("face fetch worker panicked")]
    Worker,
}

/// Generic fetch capability returning raw text or image bytes.
///
/// `Sync` so the cubemap loader can share one source across its fetch
/// threads.
pub trait AssetSource: Sync {
    fn load_text(&self, path: &str) -> Result<String, AssetError>;
    fn load_bytes(&self, path: &str) -> Result<Vec<u8>, AssetError>;
}

/// Filesystem-backed asset source rooted at a directory.
pub struct FsAssets {
    root: PathBuf,
}

impl FsAssets {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl AssetSource for FsAssets {
    fn load_text(&self, path: &str) -> Result<String, AssetError> {
        std::fs::read_to_string(self.resolve(path)).map_err(|source| AssetError::Io {
            path: path.to_string(),
            source,
        })
    }

    fn load_bytes(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        std::fs::read(self.resolve(path)).map_err(|source| AssetError::Io {
            path: path.to_string(),
            source,
        })
    }
}

/// One face of the sky cubemap, named by its logical direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubemapFace {
    Left,
    Right,
    Down,
    Top,
    Back,
    Front,
}

impl CubemapFace {
    pub const ALL: [CubemapFace; 6] = [
        CubemapFace::Left,
        CubemapFace::Right,
        CubemapFace::Down,
        CubemapFace::Top,
        CubemapFace::Back,
        CubemapFace::Front,
    ];

    /// Fixed fetch path for this face, relative to the asset root.
    pub fn path(self) -> &'static str {
        match self {
            CubemapFace::Left => "skybox/left.png",
            CubemapFace::Right => "skybox/right.png",
            CubemapFace::Down => "skybox/down.png",
            CubemapFace::Top => "skybox/top.png",
            CubemapFace::Back => "skybox/back.png",
            CubemapFace::Front => "skybox/front.png",
        }
    }

    /// Cube array layer in +X,-X,+Y,-Y,+Z,-Z order:
    /// left -> -X, right -> +X, down -> -Y, top -> +Y, back -> -Z,
    /// front -> +Z.
    pub fn layer(self) -> u32 {
        match self {
            CubemapFace::Right => 0,
            CubemapFace::Left => 1,
            CubemapFace::Top => 2,
            CubemapFace::Down => 3,
            CubemapFace::Front => 4,
            CubemapFace::Back => 5,
        }
    }
}

/// A decoded face image, already sized to the cubemap's face extent.
pub struct FaceImage {
    pub face: CubemapFace,
    pub rgba: RgbaImage,
}

/// Fetch and decode all six cubemap faces in parallel.
///
/// One worker per face; the scope join is the all-complete barrier. Faces
/// whose decoded dimensions differ from `face_extent` are resized to fit
/// the fixed placeholder storage.
pub fn fetch_cubemap_faces(
    source: &dyn AssetSource,
    face_extent: u32,
) -> Result<Vec<FaceImage>, AssetError> {
    let results: Vec<Result<FaceImage, AssetError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = CubemapFace::ALL
            .iter()
            .map(|&face| scope.spawn(move || fetch_face(source, face, face_extent)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(AssetError::Worker)))
            .collect()
    });
    results.into_iter().collect()
}

fn fetch_face(
    source: &dyn AssetSource,
    face: CubemapFace,
    face_extent: u32,
) -> Result<FaceImage, AssetError> {
    let bytes = source.load_bytes(face.path())?;
    let decoded = image::load_from_memory(&bytes).map_err(|source| AssetError::Decode {
        path: face.path().to_string(),
        source,
    })?;
    let mut rgba = decoded.to_rgba8();
    if rgba.width() != face_extent || rgba.height() != face_extent {
        tracing::debug!(
            face = ?face,
            width = rgba.width(),
            height = rgba.height(),
            face_extent,
            "resizing cubemap face to storage extent"
        );
        rgba = image::imageops::resize(&rgba, face_extent, face_extent, FilterType::Triangle);
    }
    tracing::info!(face = ?face, path = face.path(), "fetched cubemap face");
    Ok(FaceImage { face, rgba })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_face_images(root: &Path, extent: u32) {
        std::fs::create_dir_all(root.join("skybox")).unwrap();
        for (i, face) in CubemapFace::ALL.iter().enumerate() {
            let img = RgbaImage::from_pixel(extent, extent, Rgba([i as u8 * 40, 0, 200, 255]));
            img.save(root.join(face.path())).unwrap();
        }
    }

    #[test]
    fn face_layers_cover_all_six() {
        let mut layers: Vec<u32> = CubemapFace::ALL.iter().map(|f| f.layer()).collect();
        layers.sort_unstable();
        assert_eq!(layers, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn fetch_all_faces_joins_complete() {
        let tmp = tempfile::tempdir().unwrap();
        write_face_images(tmp.path(), 8);
        let source = FsAssets::new(tmp.path());

        let faces = fetch_cubemap_faces(&source, 8).unwrap();
        assert_eq!(faces.len(), 6);
        for face in &faces {
            assert_eq!(face.rgba.dimensions(), (8, 8));
        }
    }

    #[test]
    fn mismatched_faces_are_resized_to_extent() {
        let tmp = tempfile::tempdir().unwrap();
        write_face_images(tmp.path(), 4);
        let source = FsAssets::new(tmp.path());

        let faces = fetch_cubemap_faces(&source, 16).unwrap();
        for face in &faces {
            assert_eq!(face.rgba.dimensions(), (16, 16));
        }
    }

    #[test]
    fn one_missing_face_fails_the_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        write_face_images(tmp.path(), 8);
        std::fs::remove_file(tmp.path().join(CubemapFace::Top.path())).unwrap();
        let source = FsAssets::new(tmp.path());

        assert!(fetch_cubemap_faces(&source, 8).is_err());
    }

    #[test]
    fn text_fetch_reads_relative_path() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("shaders")).unwrap();
        std::fs::write(tmp.path().join(VERTEX_SHADER_PATH), "// vertex").unwrap();
        let source = FsAssets::new(tmp.path());

        assert_eq!(source.load_text(VERTEX_SHADER_PATH).unwrap(), "// vertex");
        assert!(source.load_text("shaders/absent.wgsl").is_err());
    }
}
