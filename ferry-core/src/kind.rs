use std::fmt;

/// The category of a by-reference value, carried on the wire next to its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Function,
    BoundMethod,
    ClassMethod,
    Class,
    Instance,
    Module,
    Frame,
    Dict,
    List,
    Exception,
    Other,
}

/// Structural capability a value exposes regardless of where it lives.
///
/// Callers test capability membership instead of nominal type equality: a
/// proxy for a remote list is `ListLike` even though it is not a local list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Callable,
    DictLike,
    ListLike,
    Instantiable,
    HasAttributes,
}

impl Kind {
    pub const ALL: [Kind; 11] = [
        Kind::Function,
        Kind::BoundMethod,
        Kind::ClassMethod,
        Kind::Class,
        Kind::Instance,
        Kind::Module,
        Kind::Frame,
        Kind::Dict,
        Kind::List,
        Kind::Exception,
        Kind::Other,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Kind::Function => "function",
            Kind::BoundMethod => "bound_method",
            Kind::ClassMethod => "class_method",
            Kind::Class => "class",
            Kind::Instance => "instance",
            Kind::Module => "module",
            Kind::Frame => "frame",
            Kind::Dict => "dict",
            Kind::List => "list",
            Kind::Exception => "exception",
            Kind::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Option<Kind> {
        Kind::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn capabilities(self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Kind::Function | Kind::BoundMethod => &[Callable, HasAttributes],
            Kind::ClassMethod => &[HasAttributes],
            Kind::Class => &[Callable, Instantiable, HasAttributes],
            // Instances may define `__call__`; the owner decides at call time.
            Kind::Instance => &[Callable, HasAttributes],
            Kind::Module | Kind::Frame | Kind::Other => &[HasAttributes],
            Kind::Dict => &[DictLike],
            Kind::List => &[ListLike],
            Kind::Exception => &[HasAttributes],
        }
    }

    pub fn supports(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(Kind::from_name("tasklet"), None);
    }

    #[test]
    fn test_container_capabilities() {
        assert!(Kind::List.supports(Capability::ListLike));
        assert!(!Kind::List.supports(Capability::DictLike));
        assert!(Kind::Dict.supports(Capability::DictLike));
        assert!(!Kind::Dict.supports(Capability::Callable));
        assert!(Kind::Class.supports(Capability::Instantiable));
        assert!(Kind::Function.supports(Capability::Callable));
    }
}
