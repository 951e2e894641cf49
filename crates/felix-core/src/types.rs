use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Defines a closed string-keyed enum with `as_str`, `parse_str`, and
/// `Display`. Unknown strings are rejected: both kind sets are closed.
macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Returns the lowercase string representation of this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str),+
                }
            }

            /// Parses the string form. Returns `None` for anything outside
            /// the closed set.
            pub fn parse_str(s: &str) -> Option<Self> {
                match s {
                    $($str => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// All members of the set, in declaration order.
            pub fn all() -> &'static [Self] {
                &[$(Self::$variant),+]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_enum! {
    /// Source languages recognized by the detection layer.
    Language {
        Rust => "rust",
        TypeScript => "typescript",
        Tsx => "tsx",
        JavaScript => "javascript",
        Python => "python",
        Go => "go",
        Java => "java",
        CSharp => "csharp",
        Php => "php",
        Ruby => "ruby",
        C => "c",
        Cpp => "cpp",
        Html => "html",
        Css => "css",
        Markdown => "markdown",
        Json => "json",
        Yaml => "yaml",
        Toml => "toml",
        Sql => "sql",
        Shell => "shell",
        Text => "text",
        Unknown => "unknown",
    }
}

/// Declared depth of analysis for a parser backend.
///
/// Ordered: `Basic < Structural < Semantic`. Output is never promoted above
/// the emitting backend's declared level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ParsingLevel {
    #[default]
    Basic,
    Structural,
    Semantic,
}

impl ParsingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsingLevel::Basic => "basic",
            ParsingLevel::Structural => "structural",
            ParsingLevel::Semantic => "semantic",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(ParsingLevel::Basic),
            "structural" => Some(ParsingLevel::Structural),
            "semantic" => Some(ParsingLevel::Semantic),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParsingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a backend can extract. Repeated on every result, component, and
/// relationship so downstream consumers can filter without re-parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CapabilitySet {
    pub symbols: bool,
    pub relationships: bool,
    pub ranges: bool,
    pub types: bool,
    pub control_flow: bool,
    pub incremental: bool,
}

impl CapabilitySet {
    /// Outline-only extraction: symbols and ranges.
    pub fn basic() -> Self {
        CapabilitySet {
            symbols: true,
            ranges: true,
            ..Default::default()
        }
    }

    /// Structural extraction: containment and imports, no type info.
    pub fn structural() -> Self {
        CapabilitySet {
            symbols: true,
            relationships: true,
            ranges: true,
            ..Default::default()
        }
    }

    /// Full symbol graph with type hints and call edges.
    pub fn semantic() -> Self {
        CapabilitySet {
            symbols: true,
            relationships: true,
            ranges: true,
            types: true,
            control_flow: true,
            incremental: false,
        }
    }
}

/// Wire-stable capability block emitted on every parse result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityBlock {
    pub parsing_level: ParsingLevel,
    pub backend: String,
    pub capabilities: CapabilitySet,
}

impl CapabilityBlock {
    pub fn new(parsing_level: ParsingLevel, backend: &str, capabilities: CapabilitySet) -> Self {
        CapabilityBlock {
            parsing_level,
            backend: backend.to_string(),
            capabilities,
        }
    }
}

/// A 1-based, inclusive source range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourceLocation {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        SourceLocation {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Whole-line span without meaningful column info.
    pub fn lines(start_line: u32, end_line: u32) -> Self {
        SourceLocation {
            start_line,
            start_column: 1,
            end_line,
            end_column: 1,
        }
    }

    /// Ranges must be non-empty and monotonic.
    pub fn is_valid(&self) -> bool {
        self.start_line >= 1
            && self.end_line >= self.start_line
            && (self.start_line != self.end_line || self.end_column >= self.start_column)
    }

    /// Shift the range down by `lines`, used when splicing embedded-language
    /// blocks back into their host file.
    pub fn offset_lines(&self, lines: u32) -> Self {
        SourceLocation {
            start_line: self.start_line + lines,
            start_column: self.start_column,
            end_line: self.end_line + lines,
            end_column: self.end_column,
        }
    }
}

closed_enum! {
    /// Kinds of extracted program entities.
    ComponentKind {
        File => "file",
        Directory => "directory",
        Module => "module",
        Namespace => "namespace",
        Package => "package",
        Class => "class",
        Interface => "interface",
        Trait => "trait",
        Struct => "struct",
        Enum => "enum",
        EnumMember => "enum_member",
        Union => "union",
        Mixin => "mixin",
        Function => "function",
        Method => "method",
        Constructor => "constructor",
        Destructor => "destructor",
        Getter => "getter",
        Setter => "setter",
        Accessor => "accessor",
        Field => "field",
        Property => "property",
        Variable => "variable",
        Constant => "constant",
        Parameter => "parameter",
        TypeParameter => "type_parameter",
        Typedef => "typedef",
        Macro => "macro",
        Decorator => "decorator",
        Annotation => "annotation",
        Lambda => "lambda",
        Generator => "generator",
        Coroutine => "coroutine",
        Hook => "hook",
        Route => "route",
        Endpoint => "endpoint",
        Middleware => "middleware",
        Service => "service",
        Controller => "controller",
        Model => "model",
        View => "view",
        Template => "template",
        UiComponent => "ui_component",
        Schema => "schema",
        Migration => "migration",
        Query => "query",
        Trigger => "trigger",
        DocSection => "doc_section",
        Heading => "heading",
        CodeBlock => "code_block",
        ListBlock => "list_block",
        Table => "table",
        Comment => "comment",
        EmbeddedScript => "embedded_script",
        EmbeddedStyle => "embedded_style",
        StyleRule => "style_rule",
        Test => "test",
        TestSuite => "test_suite",
        Fixture => "fixture",
        Benchmark => "benchmark",
        EnvVariable => "env_variable",
        Unknown => "unknown",
    }
}

impl ComponentKind {
    /// Kinds that can contain callable bodies.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            ComponentKind::Function
                | ComponentKind::Method
                | ComponentKind::Constructor
                | ComponentKind::Destructor
                | ComponentKind::Getter
                | ComponentKind::Setter
                | ComponentKind::Accessor
                | ComponentKind::Lambda
                | ComponentKind::Generator
                | ComponentKind::Coroutine
                | ComponentKind::Hook
                | ComponentKind::Macro
        )
    }

    /// Kinds that name a type.
    pub fn is_type_like(&self) -> bool {
        matches!(
            self,
            ComponentKind::Class
                | ComponentKind::Interface
                | ComponentKind::Trait
                | ComponentKind::Struct
                | ComponentKind::Enum
                | ComponentKind::Union
                | ComponentKind::Mixin
                | ComponentKind::Typedef
                | ComponentKind::Schema
                | ComponentKind::Model
        )
    }

    /// Kinds produced by outline/doc extraction rather than code parsing.
    pub fn is_documentation(&self) -> bool {
        matches!(
            self,
            ComponentKind::DocSection
                | ComponentKind::Heading
                | ComponentKind::CodeBlock
                | ComponentKind::ListBlock
                | ComponentKind::Table
                | ComponentKind::Comment
        )
    }
}

closed_enum! {
    /// Typed directed edges between components. Inverse forms exist in the
    /// set for read-side synthesis but are never persisted; see
    /// [`RelationshipKind::inverse`].
    RelationshipKind {
        Contains => "contains",
        BelongsTo => "belongs_to",
        Extends => "extends",
        ExtendedBy => "extended_by",
        Implements => "implements",
        ImplementedBy => "implemented_by",
        Overrides => "overrides",
        OverriddenBy => "overridden_by",
        Specializes => "specializes",
        SpecializedBy => "specialized_by",
        Imports => "imports",
        ImportedBy => "imported_by",
        Exports => "exports",
        ExportedBy => "exported_by",
        ReExports => "re_exports",
        ReExportedBy => "re_exported_by",
        Calls => "calls",
        CalledBy => "called_by",
        References => "references",
        ReferencedBy => "referenced_by",
        Uses => "uses",
        UsedBy => "used_by",
        Instantiates => "instantiates",
        InstantiatedBy => "instantiated_by",
        Returns => "returns",
        ReturnedBy => "returned_by",
        Throws => "throws",
        ThrownBy => "thrown_by",
        Yields => "yields",
        YieldsTo => "yields_to",
        Awaits => "awaits",
        AwaitedBy => "awaited_by",
        SendsTo => "sends_to",
        ReceivesFrom => "receives_from",
        ReadsFrom => "reads_from",
        ReadBy => "read_by",
        WritesTo => "writes_to",
        WrittenBy => "written_by",
        Mutates => "mutates",
        MutatedBy => "mutated_by",
        Decorates => "decorates",
        DecoratedBy => "decorated_by",
        Annotates => "annotates",
        AnnotatedBy => "annotated_by",
        Wraps => "wraps",
        WrappedBy => "wrapped_by",
        Composes => "composes",
        ComposedBy => "composed_by",
        Delegates => "delegates",
        DelegatedBy => "delegated_by",
        DependsOn => "depends_on",
        DependedOnBy => "depended_on_by",
        Creates => "creates",
        CreatedBy => "created_by",
        Destroys => "destroys",
        DestroyedBy => "destroyed_by",
        Registers => "registers",
        RegisteredBy => "registered_by",
        SubscribesTo => "subscribes_to",
        PublishesTo => "publishes_to",
        Emits => "emits",
        EmittedBy => "emitted_by",
        Handles => "handles",
        HandledBy => "handled_by",
        Renders => "renders",
        RenderedBy => "rendered_by",
        RendersTemplate => "renders_template",
        Includes => "includes",
        IncludedBy => "included_by",
        Embeds => "embeds",
        EmbeddedIn => "embedded_in",
        EmbeddedInScope => "embedded_in_scope",
        LanguageBoundary => "language_boundary",
        Documents => "documents",
        DocumentedBy => "documented_by",
        Tests => "tests",
        TestedBy => "tested_by",
        Mocks => "mocks",
        MockedBy => "mocked_by",
        Configures => "configures",
        ConfiguredBy => "configured_by",
        Validates => "validates",
        ValidatedBy => "validated_by",
        Serializes => "serializes",
        Deserializes => "deserializes",
        Transforms => "transforms",
        TransformedBy => "transformed_by",
        Routes => "routes",
        RoutedBy => "routed_by",
        Injects => "injects",
        InjectedBy => "injected_by",
        Provides => "provides",
        ProvidedBy => "provided_by",
        Consumes => "consumes",
        ConsumedBy => "consumed_by",
        Links => "links",
        LinkedBy => "linked_by",
        Aliases => "aliases",
        AliasedBy => "aliased_by",
        Shadows => "shadows",
        ShadowedBy => "shadowed_by",
    }
}

impl RelationshipKind {
    /// The paired inverse kind, when one is modeled. Only one direction of a
    /// pair is ever stored; readers synthesize the other.
    pub fn inverse(&self) -> Option<RelationshipKind> {
        use RelationshipKind::*;
        let inv = match self {
            Contains => BelongsTo,
            BelongsTo => Contains,
            Extends => ExtendedBy,
            ExtendedBy => Extends,
            Implements => ImplementedBy,
            ImplementedBy => Implements,
            Overrides => OverriddenBy,
            OverriddenBy => Overrides,
            Specializes => SpecializedBy,
            SpecializedBy => Specializes,
            Imports => ImportedBy,
            ImportedBy => Imports,
            Exports => ExportedBy,
            ExportedBy => Exports,
            ReExports => ReExportedBy,
            ReExportedBy => ReExports,
            Calls => CalledBy,
            CalledBy => Calls,
            References => ReferencedBy,
            ReferencedBy => References,
            Uses => UsedBy,
            UsedBy => Uses,
            Instantiates => InstantiatedBy,
            InstantiatedBy => Instantiates,
            Returns => ReturnedBy,
            ReturnedBy => Returns,
            Throws => ThrownBy,
            ThrownBy => Throws,
            Awaits => AwaitedBy,
            AwaitedBy => Awaits,
            SendsTo => ReceivesFrom,
            ReceivesFrom => SendsTo,
            ReadsFrom => ReadBy,
            ReadBy => ReadsFrom,
            WritesTo => WrittenBy,
            WrittenBy => WritesTo,
            Mutates => MutatedBy,
            MutatedBy => Mutates,
            Decorates => DecoratedBy,
            DecoratedBy => Decorates,
            Annotates => AnnotatedBy,
            AnnotatedBy => Annotates,
            Wraps => WrappedBy,
            WrappedBy => Wraps,
            Composes => ComposedBy,
            ComposedBy => Composes,
            Delegates => DelegatedBy,
            DelegatedBy => Delegates,
            DependsOn => DependedOnBy,
            DependedOnBy => DependsOn,
            Creates => CreatedBy,
            CreatedBy => Creates,
            Destroys => DestroyedBy,
            DestroyedBy => Destroys,
            Registers => RegisteredBy,
            RegisteredBy => Registers,
            Emits => EmittedBy,
            EmittedBy => Emits,
            Handles => HandledBy,
            HandledBy => Handles,
            Renders => RenderedBy,
            RenderedBy => Renders,
            Includes => IncludedBy,
            IncludedBy => Includes,
            Embeds => EmbeddedIn,
            EmbeddedIn => Embeds,
            LanguageBoundary => EmbeddedIn,
            Documents => DocumentedBy,
            DocumentedBy => Documents,
            Tests => TestedBy,
            TestedBy => Tests,
            Mocks => MockedBy,
            MockedBy => Mocks,
            Configures => ConfiguredBy,
            ConfiguredBy => Configures,
            Validates => ValidatedBy,
            ValidatedBy => Validates,
            Transforms => TransformedBy,
            TransformedBy => Transforms,
            Routes => RoutedBy,
            RoutedBy => Routes,
            Injects => InjectedBy,
            InjectedBy => Injects,
            Provides => ProvidedBy,
            ProvidedBy => Provides,
            Consumes => ConsumedBy,
            ConsumedBy => Consumes,
            Links => LinkedBy,
            LinkedBy => Links,
            Aliases => AliasedBy,
            AliasedBy => Aliases,
            Shadows => ShadowedBy,
            ShadowedBy => Shadows,
            _ => return None,
        };
        Some(inv)
    }

    /// Whether this is the synthesized (read-side) member of its pair.
    /// Stored edges always use the canonical member.
    pub fn is_inverse_form(&self) -> bool {
        use RelationshipKind::*;
        matches!(
            self,
            BelongsTo
                | ExtendedBy
                | ImplementedBy
                | OverriddenBy
                | SpecializedBy
                | ImportedBy
                | ExportedBy
                | ReExportedBy
                | CalledBy
                | ReferencedBy
                | UsedBy
                | InstantiatedBy
                | ReturnedBy
                | ThrownBy
                | AwaitedBy
                | ReadBy
                | WrittenBy
                | MutatedBy
                | DecoratedBy
                | AnnotatedBy
                | WrappedBy
                | ComposedBy
                | DelegatedBy
                | DependedOnBy
                | CreatedBy
                | DestroyedBy
                | RegisteredBy
                | EmittedBy
                | HandledBy
                | RenderedBy
                | IncludedBy
                | EmbeddedIn
                | DocumentedBy
                | TestedBy
                | MockedBy
                | ConfiguredBy
                | ValidatedBy
                | TransformedBy
                | RoutedBy
                | InjectedBy
                | ProvidedBy
                | ConsumedBy
                | LinkedBy
                | AliasedBy
                | ShadowedBy
        )
    }
}

closed_enum! {
    /// Entity classes that carry embeddings and appear in semantic search.
    /// Tasks, notes, and rules are owned by external collaborators; the core
    /// stores their vectors and references their ids.
    EntityKind {
        Component => "component",
        Task => "task",
        Note => "note",
        Rule => "rule",
    }
}

/// Typed metadata carried by a component, with a catch-all `extras` map for
/// wire-level fields the closed struct does not model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ComponentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub framework_hints: Vec<String>,
    #[serde(default)]
    pub is_exported: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
}

/// Where a relationship came from. Timestamps are store columns, not parse
/// output, so parsing stays deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Provenance {
    pub source: String,
    pub parser: String,
    pub backend: String,
}

/// Typed metadata carried by a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    /// Resolution confidence in [0, 1].
    pub confidence: f64,
    /// Edge strength in [0, 1], used for strength-ordered neighbor queries.
    pub strength: f64,
    #[serde(default)]
    pub needs_resolution: bool,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default)]
    pub is_junk: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_reason: Option<String>,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl Default for RelationshipMetadata {
    fn default() -> Self {
        RelationshipMetadata {
            confidence: 1.0,
            strength: 1.0,
            needs_resolution: false,
            is_external: false,
            is_junk: false,
            last_attempt_reason: None,
            usage_count: 0,
            provenance: None,
            extras: BTreeMap::new(),
        }
    }
}

/// A named program entity extracted from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Stable id: base62(xxh64(file_path, name, kind)), line-disambiguated
    /// on collision. See [`crate::hash`].
    pub id: String,
    pub name: String,
    pub kind: ComponentKind,
    pub language: Language,
    pub file_path: String,
    pub location: SourceLocation,
    /// Containing component; `None` only for file components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Raw source slice, when the backend keeps one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub metadata: ComponentMetadata,
    pub capability: CapabilityBlock,
}

impl Component {
    pub fn is_file(&self) -> bool {
        self.kind == ComponentKind::File
    }
}

/// Prefix for symbolic targets awaiting resolution.
pub const RESOLVE_PREFIX: &str = "RESOLVE:";
/// Prefix for synthesized external-module ids.
pub const EXTERNAL_PREFIX: &str = "external:module:";

/// Builds a `RESOLVE:<specifier>` placeholder target.
pub fn resolve_placeholder(specifier: &str) -> String {
    format!("{RESOLVE_PREFIX}{specifier}")
}

/// Builds an `external:module:<scheme>:<name>` target id.
pub fn external_module_id(scheme: &str, name: &str) -> String {
    format!("{EXTERNAL_PREFIX}{scheme}:{name}")
}

/// A typed directed edge between components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Stable id: base62(xxh64(source, target, kind, location-or-ordinal)).
    pub id: String,
    pub source_id: String,
    /// Concrete component id, `RESOLVE:<spec>` placeholder, or
    /// `external:module:<scheme>:<name>`.
    pub target_id: String,
    pub kind: RelationshipKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default)]
    pub metadata: RelationshipMetadata,
}

impl Relationship {
    /// Whether the target is a `RESOLVE:` placeholder.
    pub fn is_unresolved_placeholder(&self) -> bool {
        self.target_id.starts_with(RESOLVE_PREFIX)
    }

    /// Whether the target points outside the indexed project.
    pub fn is_external_target(&self) -> bool {
        self.target_id.starts_with(EXTERNAL_PREFIX)
    }

    /// The raw specifier of a `RESOLVE:` placeholder target, if any.
    pub fn resolve_specifier(&self) -> Option<&str> {
        self.target_id.strip_prefix(RESOLVE_PREFIX)
    }
}

/// Direction for edge queries and traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    Incoming,
    Outgoing,
    Both,
}

/// Errors from graph storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Schema migration {version} ({name}) failed: {message}")]
    Migration {
        version: u32,
        name: String,
        message: String,
    },

    #[error("Unknown kind in store: {0}")]
    InvalidKind(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
