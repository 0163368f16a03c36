// src/utils/url.rs

//! URL manipulation utilities.

use regex::Regex;

const DRIVE_HOST: &str = "drive.google.com";

/// Extract domain from a URL.
pub fn get_domain(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str().map(|host| host.to_lowercase())
}

/// Whether the URL points at Google Drive.
pub fn is_drive_url(url: &str) -> bool {
    get_domain(url).is_some_and(|domain| domain == DRIVE_HOST)
}

/// Extract the file id from a Google Drive sharing link.
///
/// Handles `/file/d/<id>/view` paths and `/open?id=<id>` (or `uc?id=<id>`)
/// query links.
pub fn drive_file_id(url: &str) -> Option<String> {
    if !is_drive_url(url) {
        return None;
    }
    let parsed = url::Url::parse(url).ok()?;

    let file_path = Regex::new(r"^/file/d/([A-Za-z0-9_-]+)").ok()?;
    if let Some(caps) = file_path.captures(parsed.path()) {
        return caps.get(1).map(|id| id.as_str().to_string());
    }

    parsed
        .query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Rewrite a Drive sharing link into a direct download link.
///
/// Other URLs are returned unchanged.
pub fn convert_drive_url(url: &str) -> String {
    match drive_file_id(url) {
        Some(id) => format!("https://{DRIVE_HOST}/uc?export=download&id={id}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://Sistemas.UNDC.edu.pe/bienesyservicios/"),
            Some("sistemas.undc.edu.pe".to_string())
        );
        assert_eq!(get_domain("not a url"), None);
    }

    #[test]
    fn test_drive_file_path_link() {
        let url = "https://drive.google.com/file/d/1AbC_d-9/view?usp=sharing";
        assert_eq!(drive_file_id(url), Some("1AbC_d-9".to_string()));
        assert_eq!(
            convert_drive_url(url),
            "https://drive.google.com/uc?export=download&id=1AbC_d-9"
        );
    }

    #[test]
    fn test_drive_open_link() {
        let url = "https://drive.google.com/open?id=XYZ123";
        assert_eq!(
            convert_drive_url(url),
            "https://drive.google.com/uc?export=download&id=XYZ123"
        );
    }

    #[test]
    fn test_non_drive_link_unchanged() {
        let url = "https://sistemas.undc.edu.pe/archivos/bases.pdf";
        assert!(!is_drive_url(url));
        assert_eq!(convert_drive_url(url), url);
    }

    #[test]
    fn test_drive_link_without_id_unchanged() {
        let url = "https://drive.google.com/drive/folders";
        assert_eq!(drive_file_id(url), None);
        assert_eq!(convert_drive_url(url), url);
    }
}
