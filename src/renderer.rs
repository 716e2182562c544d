use std::path::{
    Path,
    PathBuf,
};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[\[([\w\s.]+)\]\]").unwrap());
static MATH_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$([^$]+)\$\$").unwrap());
static MATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([^ .$][^$]*)\$").unwrap());

/// A media reference scraped from card text, resolved for `storeMediaFile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub filename: String,
    pub path: PathBuf,
}

/// Renders raw card text into the form stored in Anki. Pure and
/// deterministic: embedded image refs become `<img>` tags, `$`/`$$` spans
/// become anki-mathjax elements, and line breaks become `<br />`.
pub fn render(text: &str) -> String {
    let text = format_images(text);
    let text = format_math(&text);
    text.replace('\n', "<br />")
}

/// Wraps `![[name]]` image references in HTML img syntax.
pub fn format_images(text: &str) -> String {
    IMAGE_RE.replace_all(text, "<img src=\"$1\">").into_owned()
}

/// Wraps math expressions in anki-mathjax HTML syntax. Block expressions
/// must be rewritten first or their double dollars would match the inline
/// pattern.
pub fn format_math(text: &str) -> String {
    let text = MATH_BLOCK_RE.replace_all(text, "<anki-mathjax block=true>$1</anki-mathjax>");
    MATH_RE.replace_all(&text, "<anki-mathjax>$1</anki-mathjax>").into_owned()
}

/// Collects the image references of a text with their filesystem locations.
/// A name is tried as-is first, then relative to the document's directory;
/// unresolvable refs keep the relative path so the upload failure names them.
pub fn scrape_media(text: &str, base_dir: &Path) -> Vec<MediaFile> {
    let mut media = Vec::new();

    for caps in IMAGE_RE.captures_iter(text) {
        let filename = caps[1].to_string();
        let candidate = Path::new(&filename);

        let path = if candidate.exists() {
            candidate.canonicalize().unwrap_or_else(|_| candidate.to_path_buf())
        } else {
            let in_base = base_dir.join(candidate);
            if in_base.exists() {
                in_base.canonicalize().unwrap_or(in_base)
            } else {
                warn!("unable to resolve media file '{}', keeping relative path", filename);
                candidate.to_path_buf()
            }
        };

        media.push(MediaFile { filename, path });
    }

    media
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_image_references() {
        assert_eq!(
            format_images("see ![[diagram 1.png]] here"),
            "see <img src=\"diagram 1.png\"> here"
        );
    }

    #[test]
    fn formats_inline_and_block_math() {
        assert_eq!(format_math("so $x^2$ holds"), "so <anki-mathjax>x^2</anki-mathjax> holds");
        assert_eq!(
            format_math("$$\\int_0^1 x dx$$"),
            "<anki-mathjax block=true>\\int_0^1 x dx</anki-mathjax>"
        );
        // a lone dollar sign is untouched
        assert_eq!(format_math("it costs $ 5 at most"), "it costs $ 5 at most");
    }

    #[test]
    fn render_converts_line_breaks() {
        assert_eq!(render("Rome\n(on the Tiber)"), "Rome<br />(on the Tiber)");
    }

    #[test]
    fn scrapes_media_from_document_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("img.png"), b"png").unwrap();

        let media = scrape_media("![[img.png]] and ![[missing.png]]", dir.path());
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].filename, "img.png");
        assert!(media[0].path.is_absolute());
        assert_eq!(media[1].path, PathBuf::from("missing.png"));
    }
}
