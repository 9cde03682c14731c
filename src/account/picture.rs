use thiserror::Error;
use url::Url;

pub const ALLOWED_PICTURE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PictureUrlError {
    #[error("profile picture URL is not a valid URL")]
    Malformed,
    #[error("profile picture URL must use http or https")]
    UnsupportedScheme,
    #[error("profile picture must be a .jpg, .jpeg or .png file")]
    UnsupportedExtension,
}

impl PictureUrlError {
    pub fn code(self) -> &'static str {
        match self {
            PictureUrlError::Malformed => "malformed_url",
            PictureUrlError::UnsupportedScheme => "unsupported_scheme",
            PictureUrlError::UnsupportedExtension => "unsupported_extension",
        }
    }
}

/// Syntactic check of a profile picture URL. Nothing is fetched.
pub fn validate_profile_picture_url(raw: &str) -> Result<Url, PictureUrlError> {
    let url = Url::parse(raw.trim()).map_err(|_| PictureUrlError::Malformed)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PictureUrlError::UnsupportedScheme);
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(PictureUrlError::Malformed);
    }

    let file_name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    match file_name.rsplit_once('.') {
        Some((_, ext))
            if ALLOWED_PICTURE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed)) =>
        {
            Ok(url)
        }
        _ => Err(PictureUrlError::UnsupportedExtension),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_extensions_in_any_case() {
        for raw in [
            "https://cdn.example.com/avatars/42.jpg",
            "https://cdn.example.com/avatars/42.JPEG",
            "http://localhost:9000/profile/me.Png",
            "https://cdn.example.com/a/b/c.png?size=64#top",
            "https://cdn.example.com/.png",
        ] {
            assert!(validate_profile_picture_url(raw).is_ok(), "{raw}");
        }
    }

    #[test]
    fn rejects_other_extensions() {
        for raw in [
            "https://cdn.example.com/avatars/42.gif",
            "https://cdn.example.com/avatars/42.jpg.exe",
            "https://cdn.example.com/avatars/png",
            "https://cdn.example.com/avatars/42.png/",
            "https://cdn.example.com/",
            "https://cdn.example.com/img?file=42.png",
        ] {
            assert_eq!(
                validate_profile_picture_url(raw),
                Err(PictureUrlError::UnsupportedExtension),
                "{raw}"
            );
        }
    }

    #[test]
    fn rejects_malformed_urls() {
        assert_eq!(
            validate_profile_picture_url("not a url.png"),
            Err(PictureUrlError::Malformed)
        );
        assert_eq!(
            validate_profile_picture_url("/relative/path.png"),
            Err(PictureUrlError::Malformed)
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert_eq!(
            validate_profile_picture_url("ftp://files.example.com/me.png"),
            Err(PictureUrlError::UnsupportedScheme)
        );
        assert_eq!(
            validate_profile_picture_url("file:///tmp/me.png"),
            Err(PictureUrlError::UnsupportedScheme)
        );
    }
}
