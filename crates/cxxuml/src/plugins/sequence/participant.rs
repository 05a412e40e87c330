//! Sequence diagram participants
//!
//! Every participant shares the common attributes of [`Participant`]; the
//! kind specific data lives in [`ParticipantDetails`]. Renderers never
//! downcast, they ask for a typed view through [`ParticipantFacet`].

use serde::Serialize;
use std::fmt;
use std::ops::Deref;

use crate::core::config::MethodArguments;
use crate::core::names::{
    abbreviate, format_template_arguments, parse_template_arguments, TemplateArgument,
    ABBREVIATED_ARGUMENTS_LENGTH,
};
use crate::core::{
    CallableDecl, CallableKind, ClassDecl, DiagramError, ParticipantId, SourceLocation,
};

/// How message names render call arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageRenderMode {
    #[default]
    Full,
    Abbreviated,
    NoArguments,
}

impl From<MethodArguments> for MessageRenderMode {
    fn from(value: MethodArguments) -> Self {
        match value {
            MethodArguments::Full => MessageRenderMode::Full,
            MethodArguments::Abbreviated => MessageRenderMode::Abbreviated,
            MethodArguments::None => MessageRenderMode::NoArguments,
        }
    }
}

/// Signature data shared by all callables
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FunctionInfo {
    pub parameters: Vec<String>,
    pub return_type: String,
    pub is_void: bool,
    pub is_const: bool,
    pub is_static: bool,
    pub is_coroutine: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub template_arguments: Vec<TemplateArgument>,
}

impl FunctionInfo {
    fn from_decl(decl: &CallableDecl) -> Result<Self, DiagramError> {
        let template_arguments = match decl.template_arguments.as_deref() {
            Some(text) => parse_template_arguments(text)?,
            None => Vec::new(),
        };
        let return_type = if decl.is_constructor {
            decl.class
                .clone()
                .unwrap_or_else(|| decl.name.clone())
        } else {
            decl.return_type
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "void".to_string())
        };

        Ok(Self {
            parameters: decl.parameters.iter().map(|p| p.trim().to_string()).collect(),
            return_type,
            is_void: decl.is_void(),
            is_const: decl.is_const,
            is_static: decl.is_static,
            is_coroutine: decl.is_coroutine,
            template_arguments,
        })
    }

    fn template_suffix(&self) -> String {
        if self.template_arguments.is_empty() {
            String::new()
        } else {
            format!("<{}>", format_template_arguments(&self.template_arguments))
        }
    }

    fn message_name(&self, name: &str, mode: MessageRenderMode) -> String {
        let constness = if self.is_const { " const" } else { "" };
        let arguments = self.parameters.join(",");
        let arguments = match mode {
            MessageRenderMode::Full => arguments,
            MessageRenderMode::Abbreviated => abbreviate(&arguments, ABBREVIATED_ARGUMENTS_LENGTH),
            MessageRenderMode::NoArguments => String::new(),
        };
        format!("{}{}({}){}", name, self.template_suffix(), arguments, constness)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodInfo {
    pub function: FunctionInfo,
    pub class_id: ParticipantId,
    pub class_full_name: String,
    pub method_name: String,
    pub is_constructor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LambdaInfo {
    pub function: FunctionInfo,
    /// Enclosing class, when the lambda is defined inside a method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ParticipantId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ClassInfo {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub template_arguments: Vec<TemplateArgument>,
    pub is_struct: bool,
}

/// Kind specific participant data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParticipantDetails {
    Function(FunctionInfo),
    Coroutine(FunctionInfo),
    Method(MethodInfo),
    Lambda(LambdaInfo),
    Class(ClassInfo),
    File,
}

/// A uniquely identified callable or declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub id: ParticipantId,
    /// Unqualified display name
    pub name: String,
    /// Qualified name including template and parameter lists
    pub full_name: String,
    /// Identity string the id is derived from
    #[serde(skip)]
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub skip: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<String>,
    #[serde(flatten)]
    pub details: ParticipantDetails,
}

impl Participant {
    fn with_details(
        name: String,
        full_name: String,
        signature: String,
        details: ParticipantDetails,
    ) -> Self {
        Self {
            id: ParticipantId::from_signature(&signature),
            name,
            full_name,
            signature,
            location: None,
            end_line: None,
            comment: None,
            skip: false,
            styles: Vec::new(),
            details,
        }
    }

    /// Build a class participant
    pub fn from_class(decl: &ClassDecl) -> Result<Self, DiagramError> {
        let template_arguments = match decl.template_arguments.as_deref() {
            Some(text) => parse_template_arguments(text)?,
            None => Vec::new(),
        };
        let full_name = if template_arguments.is_empty() {
            decl.qualified_name.clone()
        } else {
            format!(
                "{}<{}>",
                decl.qualified_name,
                format_template_arguments(&template_arguments)
            )
        };
        let mut participant = Self::with_details(
            decl.name.clone(),
            full_name.clone(),
            full_name,
            ParticipantDetails::Class(ClassInfo {
                template_arguments,
                is_struct: decl.is_struct,
            }),
        );
        participant.location = decl.location.clone();
        Ok(participant)
    }

    /// Build a function, method, coroutine or lambda participant
    ///
    /// Methods need the id of their (already registered) owning class.
    pub fn from_callable(
        decl: &CallableDecl,
        class: Option<(ParticipantId, &str)>,
    ) -> Result<Self, DiagramError> {
        let function = FunctionInfo::from_decl(decl)?;
        let constness = if function.is_const { " const" } else { "" };
        let full_name = format!(
            "{}{}({}){}",
            decl.qualified_name,
            function.template_suffix(),
            function.parameters.join(","),
            constness
        );

        let (signature, details) = match decl.kind {
            CallableKind::Method => {
                let (class_id, class_full_name) = class.ok_or_else(|| {
                    DiagramError::contract_violation(format!(
                        "Method '{}' registered without its class",
                        full_name
                    ))
                })?;
                (
                    full_name.clone(),
                    ParticipantDetails::Method(MethodInfo {
                        function,
                        class_id,
                        class_full_name: class_full_name.to_string(),
                        method_name: decl.name.clone(),
                        is_constructor: decl.is_constructor,
                    }),
                )
            }
            CallableKind::Lambda => {
                // Lambdas are anonymous; the definition site tells them apart
                let site = decl
                    .location
                    .as_ref()
                    .map(|l| l.to_string())
                    .unwrap_or_default();
                (
                    format!("{}@{}", full_name, site),
                    ParticipantDetails::Lambda(LambdaInfo {
                        function,
                        class_id: class.map(|(id, _)| id),
                    }),
                )
            }
            CallableKind::Function if function.is_coroutine => {
                (full_name.clone(), ParticipantDetails::Coroutine(function))
            }
            CallableKind::Function => (full_name.clone(), ParticipantDetails::Function(function)),
        };

        let mut participant = Self::with_details(decl.name.clone(), full_name, signature, details);
        participant.location = decl.location.clone();
        participant.end_line = decl.end_line;
        Ok(participant)
    }

    /// A participant standing for all free functions of one source file
    pub fn file(path: &str) -> Self {
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path).to_string();
        let mut participant = Self::with_details(
            name,
            path.to_string(),
            path.to_string(),
            ParticipantDetails::File,
        );
        participant.location = Some(SourceLocation::new(path, 0, 0));
        participant
    }

    /// Kind name used in logs and JSON output
    pub fn type_name(&self) -> &'static str {
        match self.details {
            ParticipantDetails::Function(_) => "function",
            ParticipantDetails::Coroutine(_) => "coroutine",
            ParticipantDetails::Method(_) => "method",
            ParticipantDetails::Lambda(_) => "lambda",
            ParticipantDetails::Class(_) => "class",
            ParticipantDetails::File => "file",
        }
    }

    /// Signature data, for any callable kind
    pub fn function_info(&self) -> Option<&FunctionInfo> {
        match &self.details {
            ParticipantDetails::Function(f) | ParticipantDetails::Coroutine(f) => Some(f),
            ParticipantDetails::Method(m) => Some(&m.function),
            ParticipantDetails::Lambda(l) => Some(&l.function),
            ParticipantDetails::Class(_) | ParticipantDetails::File => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.function_info().is_some()
    }

    pub fn is_method(&self) -> bool {
        matches!(self.details, ParticipantDetails::Method(_))
    }

    /// Free functions and coroutines, the participants that can be combined per file
    pub fn is_free_function(&self) -> bool {
        matches!(
            self.details,
            ParticipantDetails::Function(_) | ParticipantDetails::Coroutine(_)
        )
    }

    /// Non-callables count as void
    pub fn is_void(&self) -> bool {
        self.function_info().map(|f| f.is_void).unwrap_or(true)
    }

    pub fn is_static(&self) -> bool {
        self.function_info().map(|f| f.is_static).unwrap_or(false)
    }

    pub fn return_type(&self) -> Option<&str> {
        self.function_info().map(|f| f.return_type.as_str())
    }

    pub fn source_file(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.file.as_str())
    }

    /// True if this participant's definition covers `line` of a file ending with `file`
    pub fn contains_line(&self, file: &str, line: u32) -> bool {
        let Some(location) = self.location.as_ref() else {
            return false;
        };
        if !crate::core::names::path_ends_with(&location.file, file) {
            return false;
        }
        let end = self.end_line.unwrap_or(location.line).max(location.line);
        (location.line..=end).contains(&line)
    }

    /// Label of a call to this participant
    pub fn message_name(&self, mode: MessageRenderMode) -> String {
        match &self.details {
            ParticipantDetails::Function(f) | ParticipantDetails::Coroutine(f) => {
                f.message_name(&self.name, mode)
            }
            ParticipantDetails::Method(m) => m.function.message_name(&m.method_name, mode),
            ParticipantDetails::Lambda(l) => l.function.message_name("operator()", mode),
            ParticipantDetails::Class(_) | ParticipantDetails::File => self.name.clone(),
        }
    }

    /// Default alias in generated diagram sources
    pub fn alias(&self) -> String {
        self.id.alias()
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Participant '{}': id={}, name={}",
            self.type_name(),
            self.id,
            self.full_name
        )?;
        if let ParticipantDetails::Method(m) = &self.details {
            write!(f, ", class_id={}", m.class_id)?;
        }
        Ok(())
    }
}

/// A typed view of a participant, returned by `get_participant::<T>()`
pub trait ParticipantFacet<'a>: Sized {
    fn from_participant(participant: &'a Participant) -> Option<Self>;
}

impl<'a> ParticipantFacet<'a> for &'a Participant {
    fn from_participant(participant: &'a Participant) -> Option<Self> {
        Some(participant)
    }
}

macro_rules! participant_view {
    ($(#[$doc:meta])* $view:ident, $info:ty, |$p:ident| $extract:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $view<'a> {
            pub participant: &'a Participant,
            pub info: &'a $info,
        }

        impl<'a> ParticipantFacet<'a> for $view<'a> {
            fn from_participant($p: &'a Participant) -> Option<Self> {
                let info = $extract?;
                Some(Self {
                    participant: $p,
                    info,
                })
            }
        }

        impl Deref for $view<'_> {
            type Target = Participant;

            fn deref(&self) -> &Participant {
                self.participant
            }
        }
    };
}

participant_view!(
    /// Any callable: function, coroutine, method or lambda
    FunctionView,
    FunctionInfo,
    |p| p.function_info()
);

participant_view!(MethodView, MethodInfo, |p| match &p.details {
    ParticipantDetails::Method(m) => Some(m),
    _ => None,
});

participant_view!(LambdaView, LambdaInfo, |p| match &p.details {
    ParticipantDetails::Lambda(l) => Some(l),
    _ => None,
});

participant_view!(ClassView, ClassInfo, |p| match &p.details {
    ParticipantDetails::Class(c) => Some(c),
    _ => None,
});
