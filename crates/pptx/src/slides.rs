//! Slide parts on disk.
//!
//! Works on a presentation package that has already been unpacked into a
//! directory; slide parts are the `slide<N>.xml` files under it.

use crate::xml::XmlDocument;
use slidemob_core::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One slide part.
#[derive(Debug, Clone)]
pub struct Slide {
    /// Part file name, e.g. `slide3.xml`.
    pub name: String,
    /// File the slide was loaded from, if any.
    pub path: Option<PathBuf>,
    pub document: XmlDocument,
}

impl Slide {
    /// Parse a slide from XML text.
    pub fn from_xml(name: &str, xml: &str) -> Result<Self> {
        let document = XmlDocument::parse(xml)
            .map_err(|e| annotate(e, name))?;
        if document.local_name(document.root()) != Some("sld") {
            return Err(Error::InvalidDocument(format!(
                "{}: root element is not a slide",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            path: None,
            document,
        })
    }

    /// Read and parse a slide part.
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let xml = std::fs::read_to_string(path)?;
        let mut slide = Self::from_xml(&name, &xml)?;
        slide.path = Some(path.to_path_buf());
        Ok(slide)
    }

    /// Serialize the slide.
    pub fn to_xml(&self) -> String {
        self.document.to_xml_string()
    }

    /// Write the slide to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_xml())?;
        Ok(())
    }
}

fn annotate(error: Error, name: &str) -> Error {
    match error {
        Error::XmlError(msg) => Error::XmlError(format!("{}: {}", name, msg)),
        Error::InvalidDocument(msg) => Error::InvalidDocument(format!("{}: {}", name, msg)),
        other => other,
    }
}

/// Find slide parts below `dir`, in presentation order.
///
/// Only files named `slide<N>.xml` count; layouts, masters and relationship
/// parts are ignored. The order comes from the slide list in
/// `ppt/presentation.xml` when the package has one; parts it does not list,
/// or every part when it is missing, follow by slide number.
pub fn find_slide_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let order = presentation_order(dir)?.unwrap_or_default();
    let mut slides = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| {
            Error::IoError(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if let Some(number) = slide_number(&name) {
            let rank = order
                .iter()
                .position(|listed| *listed == name)
                .unwrap_or(order.len());
            slides.push((rank, number, entry.path().to_path_buf()));
        }
    }

    slides.sort();
    log::debug!("Found {} slide parts in {}", slides.len(), dir.display());
    Ok(slides.into_iter().map(|(_, _, path)| path).collect())
}

/// Slide part file names in the order `ppt/presentation.xml` lists them.
/// `None` when the package has no presentation part or relationships.
fn presentation_order(dir: &Path) -> Result<Option<Vec<String>>> {
    let ppt = dir.join("ppt");
    let presentation_path = ppt.join("presentation.xml");
    let rels_path = ppt.join("_rels").join("presentation.xml.rels");
    if !presentation_path.is_file() || !rels_path.is_file() {
        return Ok(None);
    }

    let rels = XmlDocument::parse(&std::fs::read_to_string(&rels_path)?)
        .map_err(|e| annotate(e, "presentation.xml.rels"))?;
    let targets: HashMap<&str, &str> = rels
        .descendants(rels.root(), "Relationship")
        .into_iter()
        .filter(|rel| {
            rels.attribute(*rel, "Type")
                .is_some_and(|kind| kind.ends_with("/slide"))
        })
        .filter_map(|rel| {
            let id = rels.attribute(rel, "Id")?;
            let target = rels.attribute(rel, "Target")?;
            Some((id, target.rsplit('/').next().unwrap_or(target)))
        })
        .collect();

    let presentation = XmlDocument::parse(&std::fs::read_to_string(&presentation_path)?)
        .map_err(|e| annotate(e, "presentation.xml"))?;
    let order: Vec<String> = presentation
        .descendants(presentation.root(), "sldId")
        .into_iter()
        .filter_map(|sld| {
            // The relationship id is the namespaced `r:id`; a bare `id` is
            // the numeric slide id.
            let (_, rel_id) = presentation
                .attributes(sld)
                .iter()
                .find(|(key, _)| key.split_once(':').is_some_and(|(_, local)| local == "id"))?;
            targets.get(rel_id.as_str()).map(|name| name.to_string())
        })
        .collect();

    log::debug!("Presentation order: {:?}", order);
    Ok(Some(order))
}

/// Load every slide part below `dir`.
pub fn load_slides(dir: &Path) -> Result<Vec<Slide>> {
    let paths = find_slide_files(dir)?;
    if paths.is_empty() {
        return Err(Error::NoSlides(dir.display().to_string()));
    }
    paths.iter().map(|path| Slide::load(path)).collect()
}

/// Slide number of a part name like `slide12.xml`.
fn slide_number(file_name: &str) -> Option<usize> {
    let stem = file_name.strip_suffix(".xml")?;
    let digits = stem.strip_prefix("slide")?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SLIDE: &str = r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld/></p:sld>"#;

    const PRESENTATION: &str = r#"<p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst><p:sldId id="258" r:id="rId4"/><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#;

    const PRESENTATION_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide3.xml"/></Relationships>"#;

    fn write_slides(dir: &Path, names: &[&str]) -> PathBuf {
        let slides = dir.join("ppt").join("slides");
        std::fs::create_dir_all(&slides).unwrap();
        for name in names {
            std::fs::write(slides.join(name), SLIDE).unwrap();
        }
        slides
    }

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_slide_number() {
        assert_eq!(slide_number("slide1.xml"), Some(1));
        assert_eq!(slide_number("slide123.xml"), Some(123));
        assert_eq!(slide_number("slideLayout1.xml"), None);
        assert_eq!(slide_number("slide1.xml.rels"), None);
        assert_eq!(slide_number("slide.xml"), None);
    }

    #[test]
    fn test_find_slide_files_orders_numerically() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        let slides = write_slides(dir, &["slide10.xml", "slide2.xml", "slide1.xml"]);
        std::fs::create_dir_all(slides.join("_rels")).unwrap();
        std::fs::write(slides.join("_rels").join("slide1.xml.rels"), "<r/>").unwrap();
        std::fs::create_dir_all(dir.join("ppt").join("slideLayouts")).unwrap();
        std::fs::write(
            dir.join("ppt").join("slideLayouts").join("slideLayout1.xml"),
            "<l/>",
        )
        .unwrap();

        let found = find_slide_files(dir).unwrap();
        assert_eq!(
            file_names(&found),
            vec!["slide1.xml", "slide2.xml", "slide10.xml"]
        );

        let loaded = load_slides(dir).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].name, "slide10.xml");
    }

    #[test]
    fn test_find_slide_files_follows_presentation_order() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        write_slides(dir, &["slide1.xml", "slide2.xml", "slide3.xml"]);
        std::fs::create_dir_all(dir.join("ppt").join("_rels")).unwrap();
        std::fs::write(dir.join("ppt").join("presentation.xml"), PRESENTATION).unwrap();
        std::fs::write(
            dir.join("ppt").join("_rels").join("presentation.xml.rels"),
            PRESENTATION_RELS,
        )
        .unwrap();

        // slide2.xml is not in the slide list, so it comes last.
        let found = find_slide_files(dir).unwrap();
        assert_eq!(
            file_names(&found),
            vec!["slide3.xml", "slide1.xml", "slide2.xml"]
        );
    }

    #[test]
    fn test_load_slides_empty_dir() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(load_slides(temp.path()), Err(Error::NoSlides(_))));
    }

    #[test]
    fn test_save_round_trip() {
        let temp = TempDir::new().unwrap();
        let slide = Slide::from_xml("slide1.xml", SLIDE).unwrap();
        let out = temp.path().join("nested").join("slide1.xml");

        slide.save(&out).unwrap();
        let reloaded = Slide::load(&out).unwrap();
        assert_eq!(reloaded.to_xml(), SLIDE);
        assert_eq!(reloaded.path.as_deref(), Some(out.as_path()));
    }

    #[test]
    fn test_from_xml_rejects_non_slides() {
        assert!(matches!(
            Slide::from_xml("x.xml", "<a:p xmlns:a=\"urn:a\"/>"),
            Err(Error::InvalidDocument(_))
        ));
        assert!(matches!(
            Slide::from_xml("x.xml", "<p:sld>"),
            Err(Error::XmlError(_))
        ));
    }
}
