use std::path::Path;

/// Fallback when the extension is unknown
pub const DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

/// Extension based content type lookup for gallery and static-site files
pub struct ContentTypes;

impl ContentTypes {
    /// Guess the content type of a local file from its extension
    pub fn guess(path: &Path) -> &'static str {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| Self::from_extension(&ext.to_ascii_lowercase()))
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Guess from a blob key
    pub fn guess_key(key: &str) -> &'static str {
        Self::guess(Path::new(key))
    }

    fn from_extension(ext: &str) -> Option<&'static str> {
        let mime = match ext {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            "ico" => "image/x-icon",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            "xcf" => "image/x-xcf",
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "js" | "mjs" => "text/javascript",
            "json" => "application/json",
            "xml" => "application/xml",
            "txt" => "text/plain",
            "md" => "text/markdown",
            "csv" => "text/csv",
            "pdf" => "application/pdf",
            "zip" => "application/zip",
            "gz" => "application/gzip",
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            "ttf" => "font/ttf",
            "mp4" => "video/mp4",
            "webm" => "video/webm",
            _ => return None,
        };
        Some(mime)
    }
}
