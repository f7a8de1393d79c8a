//! Identity normalization
//!
//! Entities mentioned across chunks and documents collapse to one logical node
//! when their title-cased ids match. The merge is purely syntactic: "Apple" and
//! "apple" merge, "NHS" and "National Health Service" do not.

use crate::node::{Node, Relationship};
use crate::property::Properties;

/// Title-case a string: a letter that follows another letter is lower-cased,
/// every other letter is upper-cased. `"john o'neil"` becomes `"John O'Neil"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_letter = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_letter {
                out.extend(ch.to_lowercase());
            } else {
                push_upper(&mut out, ch);
            }
            prev_letter = true;
        } else {
            out.push(ch);
            prev_letter = false;
        }
    }
    out
}

/// Upper-case the first character and lower-case the rest
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    let mut out = String::with_capacity(s.len());
    if let Some(first) = chars.next() {
        push_upper(&mut out, first);
    }
    for ch in chars {
        out.extend(ch.to_lowercase());
    }
    out
}

/// Lower-camel form of a property key: `"birth date"` and `"Birth_Date"`
/// both become `"birthDate"`, while `"birthDate"` is left alone.
pub fn camel_key(key: &str) -> String {
    let words: Vec<&str> = key
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .collect();

    let Some((first, rest)) = words.split_first() else {
        return key.to_string();
    };

    let mut out = if first.chars().any(char::is_lowercase) {
        let mut chars = first.chars();
        let mut head = String::with_capacity(first.len());
        if let Some(c) = chars.next() {
            head.extend(c.to_lowercase());
        }
        head.extend(chars);
        head
    } else {
        first.to_lowercase()
    };

    for word in rest {
        out.push_str(&capitalize(word));
    }
    out
}

/// Canonical form of a node: title-cased id, capitalized type, lower-camel
/// property keys and a `name` property equal to the id.
pub fn normalize_node(node: &Node) -> Node {
    let id = title_case(&node.id);
    let mut properties = normalize_properties(&node.properties);
    properties.insert("name", id.clone());

    Node {
        id,
        node_type: capitalize(&node.node_type),
        properties,
    }
}

/// Canonical form of a relationship; both endpoints are normalized
pub fn normalize_relationship(rel: &Relationship) -> Relationship {
    Relationship {
        source: normalize_node(&rel.source),
        target: normalize_node(&rel.target),
        rel_type: capitalize(&rel.rel_type),
        properties: normalize_properties(&rel.properties),
    }
}

/// Build a property-less relationship between the normalized endpoints
pub fn link(source: &Node, target: &Node, rel_type: &str) -> Relationship {
    Relationship::new(normalize_node(source), normalize_node(target), capitalize(rel_type))
}

/// Whether two raw ids denote the same entity
pub fn same_entity(a: &str, b: &str) -> bool {
    title_case(a) == title_case(b)
}

fn normalize_properties(properties: &Properties) -> Properties {
    properties
        .iter()
        .map(|(k, v)| (camel_key(k), v.to_string()))
        .collect()
}

fn push_upper(out: &mut String, ch: char) {
    let mut upper = ch.to_uppercase();
    if let Some(first) = upper.next() {
        out.push(first);
    }
    for rest in upper {
        out.extend(rest.to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("john doe"), "John Doe");
        assert_eq!(title_case("JOHN DOE"), "John Doe");
        assert_eq!(title_case("o'neil"), "O'Neil");
        assert_eq!(title_case("doc1.txt_0"), "Doc1.Txt_0");
        assert_eq!(title_case("3d printing"), "3D Printing");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("person"), "Person");
        assert_eq!(capitalize("worksAt"), "Worksat");
        assert_eq!(capitalize("FROM"), "From");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_camel_key() {
        assert_eq!(camel_key("birth date"), "birthDate");
        assert_eq!(camel_key("Birth_Date"), "birthDate");
        assert_eq!(camel_key("birthDate"), "birthDate");
        assert_eq!(camel_key("URL"), "url");
        assert_eq!(camel_key("source file id"), "sourceFileId");
        assert_eq!(camel_key("   "), "   ");
    }

    #[test]
    fn test_transforms_are_idempotent() {
        for s in ["john doe", "NHS england", "ß-strasse", "doc1.txt_12", "İstanbul", "mcDonald's"] {
            let once = title_case(s);
            assert_eq!(title_case(&once), once, "title_case({s:?})");

            let once = capitalize(s);
            assert_eq!(capitalize(&once), once, "capitalize({s:?})");

            let once = camel_key(s);
            assert_eq!(camel_key(&once), once, "camel_key({s:?})");
        }
    }

    #[test]
    fn test_normalize_node() {
        let node = Node::new("john doe", "person")
            .with_property("birth date", "1990-01-01")
            .with_property("name", "John");

        let normalized = normalize_node(&node);

        assert_eq!(normalized.id, "John Doe");
        assert_eq!(normalized.node_type, "Person");
        assert_eq!(normalized.properties.get("birthDate"), Some("1990-01-01"));
        assert_eq!(normalized.properties.get("name"), Some("John Doe"));
        assert_eq!(normalize_node(&normalized), normalized);
    }

    #[test]
    fn test_normalize_node_without_properties_gets_name() {
        let normalized = normalize_node(&Node::new("acme corp", "organization"));
        assert_eq!(normalized.properties.get("name"), Some("Acme Corp"));
        assert_eq!(normalized.properties.len(), 1);
    }

    #[test]
    fn test_normalize_relationship() {
        let rel = Relationship::new(
            Node::new("john doe", "person"),
            Node::new("acme", "organization"),
            "WORKS_AT",
        )
        .with_property("start year", "2020");

        let normalized = normalize_relationship(&rel);

        assert_eq!(normalized.source.id, "John Doe");
        assert_eq!(normalized.target.id, "Acme");
        assert_eq!(normalized.rel_type, "Works_at");
        assert_eq!(normalized.properties.get("startYear"), Some("2020"));
        assert_eq!(normalize_relationship(&normalized), normalized);
    }

    #[test]
    fn test_same_entity_is_case_insensitive_only() {
        assert!(same_entity("apple", "Apple"));
        assert!(!same_entity("NHS", "National Health Service"));
    }
}
