//! Artifact creator — packages content into a downloadable file.
//!
//! Encodes text, code, HTML, or base64 binary data into a data URI the
//! caller can download directly. The agent loop splices the `content`
//! argument in from working memory, so the model never has to repeat a
//! document it just produced.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use helmsman_core::error::ToolError;
use helmsman_core::tool::{ARTIFACT_TOOL, OutputKind, ParamKind, Tool, ToolParameter};
use serde_json::{Map, Value};

pub struct ArtifactCreatorTool;

#[async_trait]
impl Tool for ArtifactCreatorTool {
    fn name(&self) -> &str {
        ARTIFACT_TOOL
    }

    fn description(&self) -> &str {
        "Creates a downloadable file artifact from provided content. \
Use this to save text, code, reports, or images for the user. \
For example: 'save the summary as report.md', 'create a python script from this code', \
or 'package the generated image as a downloadable file'."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required(
                "filename",
                ParamKind::String,
                "The desired filename, including the extension (e.g., 'notes.txt', 'chart.html', 'image.png').",
            ),
            ToolParameter::required(
                "content",
                ParamKind::String,
                "The content for the file. This can be plain text, HTML code, or base64-encoded data for binary files like images.",
            ),
            ToolParameter::optional(
                "encoding",
                ParamKind::String,
                "The encoding of the content. Use 'text' for plain text/code/html, or 'base64' if the content is already base64-encoded (e.g., for images).",
            ),
        ]
    }

    fn output_kind(&self) -> OutputKind {
        OutputKind::DownloadableFile
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        let filename = args
            .get("filename")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filename' argument".into()))?;
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;
        let encoding = args
            .get("encoding")
            .and_then(Value::as_str)
            .unwrap_or("text");

        let mime_type = guess_mime(filename);

        let b64_content = match encoding {
            // The content is already base64, use it directly
            "base64" => content.to_string(),
            "text" => BASE64.encode(content.as_bytes()),
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "Unsupported encoding type: '{other}'. Use 'text' or 'base64'."
                )));
            }
        };

        let data_uri = format!("data:{mime_type};base64,{b64_content}");

        Ok(serde_json::json!({
            "type": "downloadable_file",
            "filename": filename,
            "mime_type": mime_type,
            "data_uri": data_uri,
            "title": format!("Download: {filename}"),
        }))
    }
}

/// Guess a MIME type from the filename extension.
fn guess_mime(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "json" => "application/json",
        "js" => "text/javascript",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn args(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn creates_text_artifact() {
        let tool = ArtifactCreatorTool;
        let result = tool
            .execute(args(&[("filename", "notes.txt"), ("content", "hello world")]))
            .await
            .unwrap();

        assert_eq!(result["filename"], "notes.txt");
        assert_eq!(result["mime_type"], "text/plain");
        let data_uri = result["data_uri"].as_str().unwrap();
        assert!(data_uri.starts_with("data:text/plain;base64,"));

        let b64 = data_uri.rsplit(',').next().unwrap();
        let decoded = BASE64.decode(b64).unwrap();
        assert_eq!(decoded, b"hello world");
    }

    #[tokio::test]
    async fn passes_base64_content_through() {
        let tool = ArtifactCreatorTool;
        let encoded = BASE64.encode(b"\x89PNG");
        let result = tool
            .execute(args(&[
                ("filename", "pixel.png"),
                ("content", &encoded),
                ("encoding", "base64"),
            ]))
            .await
            .unwrap();

        assert_eq!(result["mime_type"], "image/png");
        assert!(
            result["data_uri"]
                .as_str()
                .unwrap()
                .ends_with(&encoded)
        );
    }

    #[tokio::test]
    async fn rejects_unknown_encoding() {
        let tool = ArtifactCreatorTool;
        let err = tool
            .execute(args(&[
                ("filename", "notes.txt"),
                ("content", "hi"),
                ("encoding", "rot13"),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn mime_guessing() {
        assert_eq!(guess_mime("report.md"), "text/markdown");
        assert_eq!(guess_mime("chart.HTML"), "text/html");
        assert_eq!(guess_mime("archive.bin"), "application/octet-stream");
        assert_eq!(guess_mime("no_extension"), "application/octet-stream");
    }

    #[test]
    fn registered_under_protocol_name() {
        assert_eq!(ArtifactCreatorTool.name(), ARTIFACT_TOOL);
        assert_eq!(
            ArtifactCreatorTool.output_kind(),
            OutputKind::DownloadableFile
        );
    }
}
