//! # Module Image Cache
//!
//! Parsed [`ModuleImage`]s keyed by path, shared by every precise
//! symbolization in the process. Reading an image means reading the whole
//! file, so a report that touches the same executable twice should only pay
//! for it once.
//!
//! The cache is the crate's only global mutable state. It is behind an
//! `RwLock` and is never touched from restricted contexts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use super::image::ModuleImage;
use crate::error::Result;

static IMAGES: Lazy<RwLock<HashMap<PathBuf, Arc<ModuleImage>>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Load a module image, parsing it on first use.
///
/// Parse failures are not cached; a module replaced on disk gets another try.
pub(crate) fn module_image(path: &Path) -> Result<Arc<ModuleImage>>
{
    if let Some(existing) = IMAGES.read().unwrap_or_else(PoisonError::into_inner).get(path) {
        return Ok(existing.clone());
    }

    let image = Arc::new(ModuleImage::parse(path)?);
    tracing::debug!(path = %path.display(), "cached module image");

    let mut images = IMAGES.write().unwrap_or_else(PoisonError::into_inner);
    Ok(images.entry(path.to_path_buf()).or_insert(image).clone())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_images_are_shared()
    {
        let exe = std::env::current_exe().unwrap();
        let first = module_image(&exe).unwrap();
        let second = module_image(&exe).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(IMAGES.read().unwrap().contains_key(&exe));
    }

    #[test]
    fn test_failures_are_not_cached()
    {
        let missing = Path::new("/nonexistent/stackscope/module.so");
        assert!(module_image(missing).is_err());
        assert!(IMAGES.read().unwrap().get(missing).is_none());
    }
}
