//! Tool trait — the abstraction over agent capabilities.
//!
//! A tool is a named, described, schema-typed unit of work. The registry
//! owns the name → tool mapping and performs capability-aware argument
//! filtering before dispatch: tools that declare the open context-argument
//! channel receive every provided key, everything else receives only the
//! keys its published parameter list names.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::ToolError;

/// Name of the artifact-creation capability.
///
/// The agent loop keys its two-phase artifact protocol on this name:
/// when the model calls it, the `content` argument is spliced in from
/// working memory instead of being round-tripped through the model.
pub const ARTIFACT_TOOL: &str = "artifact_creator";

/// The type of a single tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    /// The JSON-schema type name for this kind.
    pub fn schema_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// One entry in a tool's ordered parameter list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

impl ToolParameter {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// How a tool's result should be summarized and surfaced.
///
/// The tag drives the summarization policy only — it has no effect on
/// dispatch. Caller-visible kinds additionally emit their full payload
/// on the event stream, not just the digest the model sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    WebSearchResults,
    ImageSearchResults,
    VideoSearchResults,
    TextContent,
    DownloadableFile,
    GeneratedImage,
    JsonResponse,
}

impl OutputKind {
    /// Wire/event tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebSearchResults => "web_search_results",
            Self::ImageSearchResults => "image_search_results",
            Self::VideoSearchResults => "video_search_results",
            Self::TextContent => "text_content",
            Self::DownloadableFile => "downloadable_file",
            Self::GeneratedImage => "generated_image",
            Self::JsonResponse => "json_response",
        }
    }

    /// Kinds whose results are a list of `{title, url, ...}` items.
    pub fn is_results_list(&self) -> bool {
        matches!(
            self,
            Self::WebSearchResults | Self::ImageSearchResults | Self::VideoSearchResults
        )
    }

    /// Kinds whose full payload is surfaced directly to the caller.
    pub fn is_caller_visible(&self) -> bool {
        matches!(self, Self::DownloadableFile | Self::GeneratedImage)
    }
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

/// Render an ordered parameter list as a JSON-schema object.
pub fn schema_from_params(params: &[ToolParameter]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for p in params {
        properties.insert(
            p.name.clone(),
            serde_json::json!({
                "type": p.kind.schema_type(),
                "description": p.description,
            }),
        );
        if p.required {
            required.push(Value::String(p.name.clone()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// A request to invoke a tool, as produced by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Unique invocation ID (matches the model's tool_call id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Argument mapping (unique string keys)
    pub arguments: Map<String, Value>,
}

/// The captured result of one tool invocation: a success payload or a
/// failure marker with a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ToolOutcome {
    Success(Value),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Fold a tool execution result into an outcome, stringifying errors.
    pub fn from_result(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => Self::Failure(e.to_string()),
        }
    }
}

/// The core Tool trait.
///
/// Each capability (web search, page scraping, artifact creation, ...)
/// implements this trait and is registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "web_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// The ordered public parameter list (sent to the model as a schema).
    fn parameters(&self) -> Vec<ToolParameter>;

    /// How this tool's results are summarized and surfaced.
    fn output_kind(&self) -> OutputKind {
        OutputKind::JsonResponse
    }

    /// Whether this tool accepts ambient context arguments beyond its
    /// declared parameters (caller identity, timezone, ...). When false,
    /// the registry filters undeclared keys out before dispatch.
    fn accepts_context_args(&self) -> bool {
        false
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError>;

    /// Convert this tool into a definition for the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: schema_from_params(&self.parameters()),
        }
    }
}

/// Adapter that republishes a tool under a provider-prefixed name.
///
/// Used at discovery time to disambiguate external tools whose names
/// collide with an already-registered capability.
pub struct NamespacedTool {
    name: String,
    inner: Box<dyn Tool>,
}

impl NamespacedTool {
    pub fn new(provider: &str, inner: Box<dyn Tool>) -> Self {
        Self {
            name: format!("{provider}_{}", inner.name()),
            inner,
        }
    }
}

#[async_trait]
impl Tool for NamespacedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        self.inner.parameters()
    }

    fn output_kind(&self) -> OutputKind {
        self.inner.output_kind()
    }

    fn accepts_context_args(&self) -> bool {
        self.inner.accepts_context_args()
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, ToolError> {
        self.inner.execute(args).await
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Look up and execute tools when the model requests them
///
/// The table is populated once at startup and read-only afterwards, so
/// the loop can dispatch a whole batch concurrently without locking.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool under its declared name.
    ///
    /// A colliding name is an error, never a silent replace — external
    /// providers with overlapping names go through
    /// [`register_namespaced`](Self::register_namespaced) instead.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        tracing::debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register an externally-discovered tool, prefixing its name with the
    /// provider identifier when it collides with an existing entry.
    ///
    /// Returns the name the tool was registered under.
    pub fn register_namespaced(
        &mut self,
        provider: &str,
        tool: Box<dyn Tool>,
    ) -> Result<String, ToolError> {
        if !self.tools.contains_key(tool.name()) {
            let name = tool.name().to_string();
            self.register(tool)?;
            return Ok(name);
        }
        let namespaced = NamespacedTool::new(provider, tool);
        let name = namespaced.name().to_string();
        self.register(Box::new(namespaced))?;
        Ok(name)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the model).
    ///
    /// Sorted by name so the model sees a stable listing across runs.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Resolve and execute a tool by name.
    ///
    /// Arguments are filtered to the tool's declared parameter names
    /// unless the tool accepts the open context-argument channel, in
    /// which case everything is forwarded verbatim.
    pub async fn execute(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let args = if tool.accepts_context_args() {
            args
        } else {
            let declared: Vec<String> =
                tool.parameters().into_iter().map(|p| p.name).collect();
            args.into_iter()
                .filter(|(k, _)| declared.iter().any(|d| d == k))
                .collect()
        };

        tool.execute(args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
