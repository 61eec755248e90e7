use std::fmt;

use serde::{de, de::Visitor, Deserialize, Deserializer, Serialize, Serializer};

use super::Node;

/// Nodes are serialized as their unparsed text.
impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}", self))
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(NodeVisitor)
    }
}

#[derive(Debug)]
struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a str that can be parsed by `calcex`")
    }

    fn visit_str<E>(self, unparsed: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        unparsed
            .parse::<Node>()
            .map_err(|epe| E::custom(format!("Parse error - {}", epe.msg)))
    }
}

#[cfg(test)]
use serde_test::Token;

#[test]
fn test_ser_de() {
    let test = |s: &'static str| {
        let node = s.parse::<Node>().unwrap();
        serde_test::assert_ser_tokens(&node, &[Token::Str(s)]);
        let serialized = serde_json::to_string(&node).unwrap();
        let deserialized = serde_json::from_str::<Node>(serialized.as_str()).unwrap();
        assert_eq!(node, deserialized);
        assert_eq!(s, format!("{}", deserialized));
    };

    test("x+y*2.0");
    test("x+sin(2.0*y)");
    test("1/x+cos(y)*2");
    test("f(x) := x^2+1");
    test("{{1, 2}, {3, 4}}");
}

#[test]
fn test_de_error() {
    let err = serde_json::from_str::<Node>("\"1 +\"").unwrap_err();
    assert!(format!("{}", err).contains("Parse error"));
}
