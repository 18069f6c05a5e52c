use crate::handle::DefinitionRef;
use crate::xml;
use roxmltree::Node;

/// Globally unique format id. `0` is never allocated.
pub type FormatId = u32;

/// Default text style a format derives from (`defStyleNum`).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextStyle {
    #[default]
    Normal,
    Keyword,
    Function,
    Variable,
    ControlFlow,
    Operator,
    BuiltIn,
    Extension,
    Preprocessor,
    Attribute,
    Char,
    SpecialChar,
    String,
    VerbatimString,
    SpecialString,
    Import,
    DataType,
    DecVal,
    BaseN,
    Float,
    Constant,
    Comment,
    Documentation,
    Annotation,
    CommentVar,
    RegionMarker,
    Information,
    Warning,
    Alert,
    Others,
    Error,
}

impl TextStyle {
    /// Parse a `defStyleNum` value such as `dsKeyword`.
    pub fn from_def_style_num(name: &str) -> Option<Self> {
        let style = match name.strip_prefix("ds")? {
            "Normal" => Self::Normal,
            "Keyword" => Self::Keyword,
            "Function" => Self::Function,
            "Variable" => Self::Variable,
            "ControlFlow" => Self::ControlFlow,
            "Operator" => Self::Operator,
            "BuiltIn" => Self::BuiltIn,
            "Extension" => Self::Extension,
            "Preprocessor" => Self::Preprocessor,
            "Attribute" => Self::Attribute,
            "Char" => Self::Char,
            "SpecialChar" => Self::SpecialChar,
            "String" => Self::String,
            "VerbatimString" => Self::VerbatimString,
            "SpecialString" => Self::SpecialString,
            "Import" => Self::Import,
            "DataType" => Self::DataType,
            "DecVal" => Self::DecVal,
            "BaseN" => Self::BaseN,
            "Float" => Self::Float,
            "Constant" => Self::Constant,
            "Comment" => Self::Comment,
            "Documentation" => Self::Documentation,
            "Annotation" => Self::Annotation,
            "CommentVar" => Self::CommentVar,
            "RegionMarker" => Self::RegionMarker,
            "Information" => Self::Information,
            "Warning" => Self::Warning,
            "Alert" => Self::Alert,
            "Others" => Self::Others,
            "Error" => Self::Error,
            _ => return None,
        };
        Some(style)
    }
}

/// Explicit style overrides on an `<itemData>`. `None` means "inherit from the
/// default text style".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatStyle {
    /// Foreground color, as written in the grammar (e.g. `#ff0000`).
    pub color: Option<String>,
    /// Foreground color when selected.
    pub selected_color: Option<String>,
    /// Background color.
    pub background_color: Option<String>,
    /// Background color when selected.
    pub selected_background_color: Option<String>,
    /// Bold override.
    pub bold: Option<bool>,
    /// Italic override.
    pub italic: Option<bool>,
    /// Underline override.
    pub underline: Option<bool>,
    /// Strike-through override.
    pub strike_through: Option<bool>,
}

/// A named highlighting style declared by a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    id: FormatId,
    name: String,
    definition: DefinitionRef,
    text_style: TextStyle,
    style: FormatStyle,
    spell_checking: bool,
}

impl Format {
    pub(crate) fn load(node: Node<'_, '_>, definition: DefinitionRef, id: FormatId) -> Self {
        let opt_string = |name: &str| node.attribute(name).map(str::to_string);
        let opt_bool = |name: &str| node.attribute(name).map(xml::attr_to_bool);

        Self {
            id,
            name: xml::attr(node, "name").to_string(),
            definition,
            text_style: TextStyle::from_def_style_num(xml::attr(node, "defStyleNum"))
                .unwrap_or_default(),
            style: FormatStyle {
                color: opt_string("color"),
                selected_color: opt_string("selColor"),
                background_color: opt_string("backgroundColor"),
                selected_background_color: opt_string("selBackgroundColor"),
                bold: opt_bool("bold"),
                italic: opt_bool("italic"),
                underline: opt_bool("underline"),
                strike_through: opt_bool("strikeOut"),
            },
            spell_checking: node
                .attribute("spellChecking")
                .is_none_or(xml::attr_to_bool),
        }
    }

    /// Repository-wide id.
    pub fn id(&self) -> FormatId {
        self.id
    }

    /// Name used by rules and contexts in the `attribute` attribute.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Definition declaring this format.
    pub fn definition(&self) -> DefinitionRef {
        self.definition
    }

    /// The default text style this format is based on.
    pub fn text_style(&self) -> TextStyle {
        self.text_style
    }

    /// Explicit overrides.
    pub fn style(&self) -> &FormatStyle {
        &self.style
    }

    /// Whether spell checking applies to text in this format.
    pub fn spell_checking(&self) -> bool {
        self.spell_checking
    }
}
