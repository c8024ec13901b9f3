use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use mediabox_core::{
    collect_entries, upload::format_size, GalleryEntry, UploadError, UploadPolicy, UploadedFile,
};

use crate::state::AppState;

/// Name of the multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// One-shot cookie carrying the original name of the last stored upload
/// across the Post/Redirect/Get round trip.
const FLASH_COOKIE: &str = "mediabox_uploaded";

enum Notice {
    Success(String),
    Error(String),
}

/// Upload form. Shows the success notice left by the previous submission.
pub async fn upload_form(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(name) = flash_upload(&headers) else {
        return Html(generate_upload_html(&state.policy, None)).into_response();
    };

    let notice = Notice::Success(format!("File \"{name}\" uploaded successfully!"));
    (
        [(header::SET_COOKIE, flash_cookie(""))],
        Html(generate_upload_html(&state.policy, Some(&notice))),
    )
        .into_response()
}

/// Form submission. Redirects back to the form on success.
pub async fn upload_submit(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let file = match multipart {
        Ok(multipart) => read_upload(multipart, &state.policy).await,
        Err(rejection) => {
            tracing::warn!("Upload without multipart body: {}", rejection);
            Err(UploadError::Missing)
        }
    };

    let file = match file {
        Ok(file) => file,
        Err(e) => return rejected(&state.policy, e),
    };

    let original_name = file.original_name.clone();
    match state.policy.accept(state.storage.as_ref(), file).await {
        Ok(_) => (
            [(header::SET_COOKIE, flash_cookie(&original_name))],
            Redirect::to("/"),
        )
            .into_response(),
        Err(e) => rejected(&state.policy, e),
    }
}

/// Gallery page. Listing failures degrade to an empty gallery.
pub async fn gallery(State(state): State<AppState>) -> Html<String> {
    let entries = match collect_entries(state.storage.as_ref()).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Gallery listing failed: {:?}", e);
            Vec::new()
        }
    };

    tracing::info!("Gallery request: entries={}", entries.len());
    Html(generate_gallery_html(&entries))
}

/// Read the `file` part, stopping as soon as it outgrows the policy.
async fn read_upload(
    mut multipart: Multipart,
    policy: &UploadPolicy,
) -> Result<UploadedFile, UploadError> {
    let field_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::TooLarge {
                max: policy.max_size(),
            }
        } else {
            tracing::warn!("Malformed multipart body: {}", e);
            UploadError::Missing
        }
    };

    while let Some(mut field) = multipart.next_field().await.map_err(field_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        if original_name.trim().is_empty() {
            return Err(UploadError::Missing);
        }

        let mut content = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(field_error)? {
            policy.check_size((content.len() + chunk.len()) as u64)?;
            content.extend_from_slice(&chunk);
        }
        return Ok(UploadedFile::new(original_name, content));
    }

    Err(UploadError::Missing)
}

/// `Set-Cookie` value storing `name`; an empty name expires the cookie.
fn flash_cookie(name: &str) -> String {
    let max_age = if name.is_empty() { 0 } else { 60 };
    format!(
        "{FLASH_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
        urlencoding::encode(name)
    )
}

fn flash_upload(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == FLASH_COOKIE)
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|name| name.into_owned())
        .filter(|name| !name.is_empty())
}

fn rejected(policy: &UploadPolicy, err: UploadError) -> Response {
    let (status, message) = match &err {
        UploadError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
        UploadError::Storage(source) => {
            tracing::error!("Upload failed: {:?}", source);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Upload failed, please try again.".to_string(),
            )
        }
        _ => (StatusCode::BAD_REQUEST, err.to_string()),
    };

    if err.is_validation() {
        tracing::warn!("Upload rejected: {}", message);
    }

    let notice = Notice::Error(message);
    (status, Html(generate_upload_html(policy, Some(&notice)))).into_response()
}

const STYLE: &str = r#"
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            max-width: 800px;
            margin: 60px auto;
            padding: 20px;
            color: #333;
        }
        h1 {
            font-size: 2.5rem;
            font-weight: 300;
            margin-bottom: 1rem;
        }
        nav a {
            color: #333;
            margin-right: 1rem;
        }
        .notice {
            padding: 12px 16px;
            border-radius: 4px;
            margin-bottom: 20px;
        }
        .notice.success {
            background: #e8f5e9;
        }
        .notice.error {
            background: #fdecea;
        }
        .help {
            color: #666;
            font-size: 0.9rem;
        }
        ul.files {
            list-style: none;
            padding: 0;
        }
        ul.files li {
            padding: 8px 0;
            border-bottom: 1px solid #eee;
        }
"#;

fn generate_upload_html(policy: &UploadPolicy, notice: Option<&Notice>) -> String {
    let notice = match notice {
        Some(Notice::Success(message)) => {
            format!(r#"<div class="notice success">{}</div>"#, html_escape(message))
        }
        Some(Notice::Error(message)) => {
            format!(r#"<div class="notice error">{}</div>"#, html_escape(message))
        }
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Upload a file</title>
    <style>{style}</style>
</head>
<body>
    <nav><a href="/">Upload</a><a href="/gallery/">Gallery</a></nav>
    <h1>Upload a file</h1>
    {notice}
    <form method="post" action="/" enctype="multipart/form-data">
        <input type="file" name="{field}" class="file-input" accept="*/*" required>
        <p class="help">Max size: {max_size}</p>
        <button type="submit">Upload</button>
    </form>
</body>
</html>"#,
        style = STYLE,
        notice = notice,
        field = FILE_FIELD,
        max_size = format_size(policy.max_size()),
    )
}

fn generate_gallery_html(entries: &[GalleryEntry]) -> String {
    let files = if entries.is_empty() {
        "<p>No files uploaded yet.</p>".to_string()
    } else {
        let items = entries
            .iter()
            .map(|entry| {
                format!(
                    r#"<li><a href="{url}" target="_blank" rel="noopener">{name}</a></li>"#,
                    url = html_escape(&entry.url),
                    name = html_escape(&entry.name),
                )
            })
            .collect::<Vec<_>>()
            .join("\n        ");
        format!("<ul class=\"files\">\n        {items}\n    </ul>")
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Gallery</title>
    <style>{style}</style>
</head>
<body>
    <nav><a href="/">Upload</a><a href="/gallery/">Gallery</a></nav>
    <h1>Gallery</h1>
    {files}
</body>
</html>"#,
        style = STYLE,
        files = files,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn gallery_links_each_entry_in_order() {
        let html = generate_gallery_html(&[
            GalleryEntry {
                name: "b.png".into(),
                url: "/media/b.png".into(),
            },
            GalleryEntry {
                name: "a&b.png".into(),
                url: "https://bucket.example/media/a.png?X-Amz-Signature=1&x-id=GetObject".into(),
            },
        ]);

        let first = html.find("/media/b.png").unwrap();
        let second = html.find("a&amp;b.png").unwrap();
        assert!(first < second);
        assert!(html.contains("X-Amz-Signature=1&amp;x-id=GetObject"));
        assert!(!html.contains("No files uploaded yet."));
    }

    #[test]
    fn empty_gallery_message() {
        assert!(generate_gallery_html(&[]).contains("No files uploaded yet."));
    }

    fn cookies(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, value.parse().unwrap());
        headers
    }

    #[test]
    fn flash_cookie_round_trips_the_original_name() {
        let set = flash_cookie("my holiday;1.jpg");
        assert!(set.starts_with("mediabox_uploaded=my%20holiday%3B1.jpg;"));
        assert!(set.contains("HttpOnly"));
        assert!(set.ends_with("Max-Age=60"));

        let value = set.split(';').next().unwrap();
        let headers = cookies(&format!("theme=dark; {value}"));
        assert_eq!(flash_upload(&headers).as_deref(), Some("my holiday;1.jpg"));
    }

    #[test]
    fn expired_or_foreign_cookies_carry_no_notice() {
        assert!(flash_cookie("").ends_with("Max-Age=0"));
        assert_eq!(flash_upload(&HeaderMap::new()), None);
        assert_eq!(flash_upload(&cookies("mediabox_uploaded=")), None);
        assert_eq!(flash_upload(&cookies("other=photo.png")), None);
    }

    #[test]
    fn form_shows_ceiling_and_notice() {
        let html = generate_upload_html(
            &UploadPolicy::new(10 * 1024 * 1024),
            Some(&Notice::Error("File size cannot exceed 10 MB.".into())),
        );
        assert!(html.contains("Max size: 10 MB"));
        assert!(html.contains(r#"<div class="notice error">File size cannot exceed 10 MB.</div>"#));
        assert!(html.contains(r#"enctype="multipart/form-data""#));
    }
}
