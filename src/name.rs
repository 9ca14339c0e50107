//! Module for handling names according to the W3C [Namespaces in XML 1.1 (Second Edition)][spec]
//! specification
//!
//! [spec]: https://www.w3.org/TR/xml-names11

/// Namespace permanently bound to the `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of `xmlns` and `xmlns:*` attributes
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Splits a [qualified name] into its optional prefix and its local name.
///
/// ```
/// # use xml_value::name::split_qname;
/// assert_eq!(split_qname("ex:nil"), (Some("ex"), "nil"));
/// assert_eq!(split_qname("value"), (None, "value"));
/// ```
///
/// [qualified name]: https://www.w3.org/TR/xml-names11/#dt-qualname
#[inline]
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.find(':') {
        Some(i) => (Some(&name[..i]), &name[i + 1..]),
        None => (None, name),
    }
}

/// Returns `true` for `xmlns` and `xmlns:*` attribute names.
#[inline]
pub fn is_namespace_decl(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

/// A namespace binding in scope.
///
/// An empty `prefix` is the default namespace. An empty `uri` unbinds the
/// prefix for the extent of its scope (`xmlns=""`).
#[derive(Debug, Clone)]
struct NamespaceEntry {
    prefix: String,
    uri: String,
    /// Nesting level of the declaring element, the document root is `1`
    level: u32,
}

/// A namespace management stack.
///
/// Holds all internal logic to push/pop namespaces with their levels.
#[derive(Debug, Default, Clone)]
pub(crate) struct NamespaceResolver {
    /// A stack of namespace bindings to prefixes that currently in scope
    bindings: Vec<NamespaceEntry>,
    /// The number of open tags at the moment
    nesting_level: u32,
}

impl NamespaceResolver {
    /// Begins a new scope and adds to it all [namespace bindings] found in the
    /// attributes of a start element.
    ///
    /// [namespace bindings]: https://www.w3.org/TR/xml-names11/#dt-NSDecl
    pub fn push<'a, I>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.nesting_level += 1;
        let level = self.nesting_level;
        for (key, value) in attributes {
            let prefix = match key.strip_prefix("xmlns") {
                Some("") => "",
                Some(rest) => match rest.strip_prefix(':') {
                    Some(prefix) => prefix,
                    None => continue,
                },
                None => continue,
            };
            self.bindings.push(NamespaceEntry {
                prefix: prefix.to_owned(),
                uri: value.to_owned(),
                level,
            });
        }
    }

    /// Ends the top-most scope by popping all bindings added by the last call
    /// to [`Self::push()`].
    pub fn pop(&mut self) {
        self.nesting_level = self.nesting_level.saturating_sub(1);
        let current_level = self.nesting_level;
        match self.bindings.iter().rposition(|n| n.level <= current_level) {
            None => self.bindings.clear(),
            Some(last_valid) => self.bindings.truncate(last_valid + 1),
        }
    }

    /// Finds the namespace URI bound to `prefix` (the empty string for the
    /// default namespace).
    ///
    /// Returns `None` when the prefix is not bound or was [unbound].
    ///
    /// [unbound]: https://www.w3.org/TR/xml-names11/#scoping
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        match prefix {
            "xml" => return Some(XML_NAMESPACE),
            "xmlns" => return Some(XMLNS_NAMESPACE),
            _ => {}
        }
        self.bindings
            .iter()
            .rfind(|n| n.prefix == prefix)
            .map(|n| n.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Resolves the namespace of a potentially qualified **element name** or
    /// **attribute name**.
    ///
    /// *Unqualified* attribute names do *not* inherit the current default
    /// namespace, which is controlled by `use_default`.
    pub fn resolve(&self, name: &str, use_default: bool) -> Option<&str> {
        if !use_default && name == "xmlns" {
            return Some(XMLNS_NAMESPACE);
        }
        match split_qname(name) {
            (Some(prefix), _) => self.lookup(prefix),
            (None, _) if use_default => self.lookup(""),
            (None, _) => None,
        }
    }
}
