//! Compact reference grammar for archive records.
//!
//! References take the form `[<type>:]<id>[v<version>][/<resource>[:<qualifier>]]`.
//! A bare resource name is interpreted relative to a context, which is how
//! tables inside one record refer to their siblings (fluxes, error tables).
//!
//! Parsing is pure; nothing here touches the filesystem or the network.

use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::error::HepRefError;

/// Reference type of the public HEPData namespace.
pub const HEPDATA: &str = "hepdata";
/// Reference type of the HEPData sandbox namespace.
pub const HEPDATA_SANDBOX: &str = "hepdata-sandbox";
/// Reference type of locally provisioned INSPIRE-HEP records.
pub const INSPIREHEP: &str = "inspirehep";

/// Fully resolved identifiers of a record, and optionally one resource in it.
///
/// `reftype` and `recordid` are never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceComponents {
    pub reftype: String,
    pub recordid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recordversion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resourcename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

impl ReferenceComponents {
    /// Context carrying only the record identity of this reference.
    ///
    /// Nested references found inside a record are parsed against this, so a
    /// bare resource name stays within the same record and version.
    pub fn record_context(&self) -> PartialReference {
        PartialReference {
            reftype: Some(self.reftype.clone()),
            recordid: Some(self.recordid.clone()),
            recordversion: self.recordversion.clone(),
            resourcename: None,
            qualifier: None,
        }
    }

    /// Context carrying every component of this reference.
    pub fn as_context(&self) -> PartialReference {
        PartialReference {
            reftype: Some(self.reftype.clone()),
            recordid: Some(self.recordid.clone()),
            recordversion: self.recordversion.clone(),
            resourcename: self.resourcename.clone(),
            qualifier: self.qualifier.clone(),
        }
    }

    /// Returns a copy with the record version set.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            recordversion: Some(version.into()),
            ..self.clone()
        }
    }

    /// Looks up a component by name.
    ///
    /// Unset optional components are returned as an empty string.
    pub fn component(&self, name: &str) -> Result<&str, HepRefError> {
        let value = match name {
            "type" | "reftype" => Some(self.reftype.as_str()),
            "id" | "recordid" => Some(self.recordid.as_str()),
            "version" | "recordversion" | "recordvers" => self.recordversion.as_deref(),
            "resource" | "resourcename" => self.resourcename.as_deref(),
            "qualifier" => self.qualifier.as_deref(),
            other => return Err(HepRefError::UnknownComponent(other.to_string())),
        };
        Ok(value.unwrap_or_default())
    }
}

impl fmt::Display for ReferenceComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.reftype, self.recordid)?;
        if let Some(version) = &self.recordversion {
            write!(f, "v{version}")?;
        }
        if let Some(resource) = &self.resourcename {
            write!(f, "/{resource}")?;
        }
        if let Some(qualifier) = &self.qualifier {
            write!(f, ":{qualifier}")?;
        }
        Ok(())
    }
}

/// Defaults used to fill components a reference leaves unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartialReference {
    pub reftype: Option<String>,
    pub recordid: Option<String>,
    pub recordversion: Option<String>,
    pub resourcename: Option<String>,
    pub qualifier: Option<String>,
}

impl PartialReference {
    /// Context that only supplies a reference type.
    pub fn with_reftype(reftype: impl Into<String>) -> Self {
        Self {
            reftype: Some(reftype.into()),
            ..Self::default()
        }
    }
}

impl fmt::Display for PartialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("reftype", &self.reftype),
            ("recordid", &self.recordid),
            ("recordversion", &self.recordversion),
            ("resourcename", &self.resourcename),
            ("qualifier", &self.qualifier),
        ];
        write!(f, "{{")?;
        let mut first = true;
        for (name, value) in fields {
            if let Some(value) = value {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{name}={value}")?;
                first = false;
            }
        }
        write!(f, "}}")
    }
}

/// A reference as supplied by a caller: text, a bare record id, or nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawReference<'a> {
    Empty,
    Text(&'a str),
    Id(u64),
}

impl<'a> From<&'a str> for RawReference<'a> {
    fn from(value: &'a str) -> Self {
        RawReference::Text(value)
    }
}

impl<'a> From<&'a String> for RawReference<'a> {
    fn from(value: &'a String) -> Self {
        RawReference::Text(value.as_str())
    }
}

impl From<u64> for RawReference<'_> {
    fn from(value: u64) -> Self {
        RawReference::Id(value)
    }
}

impl<'a> From<Option<&'a str>> for RawReference<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(RawReference::Empty, RawReference::Text)
    }
}

impl fmt::Display for RawReference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawReference::Empty => Ok(()),
            RawReference::Text(text) => f.write_str(text),
            RawReference::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Components set by the grammar itself, before context defaults apply.
#[derive(Debug, Default)]
struct Parsed {
    reftype: Option<String>,
    /// `Some` when the reference named a record; the version rides along with it.
    record: Option<(String, Option<String>)>,
    /// `Some` when the reference named a resource; the qualifier rides along with it.
    resource: Option<(String, Option<String>)>,
}

/// Parse a reference into components, filling gaps from `context`.
///
/// Grammar precedence:
/// 1. `record/resource`, where `record` is `[type:]id` and `resource` is
///    `name[:qualifier]`.
/// 2. `type:id`.
/// 3. An integer record id.
/// 4. Anything else is a resource name within the context's record.
///
/// A record id of the form `<id>v<version>` carries an explicit version.
/// The version belongs to the record id token and the qualifier to the
/// resource token, so naming a record or resource never inherits the
/// context's version or qualifier.
///
/// # Errors
/// Returns [`HepRefError::ReferenceGrammar`] if no reference type or record
/// id can be determined.
pub fn parse_reference<'a>(
    reference: impl Into<RawReference<'a>>,
    context: &PartialReference,
) -> Result<ReferenceComponents, HepRefError> {
    let reference = reference.into();
    let parsed = match reference {
        RawReference::Empty => Parsed::default(),
        RawReference::Text(text) if text.trim().is_empty() => Parsed::default(),
        RawReference::Text(text) => parse_text(text.trim(), &reference, context)?,
        RawReference::Id(id) => Parsed {
            record: Some((id.to_string(), None)),
            ..Parsed::default()
        },
    };

    let reftype = parsed.reftype.or_else(|| non_empty(&context.reftype));

    let (recordid, recordversion) = match parsed.record {
        Some(record) => record,
        None => match non_empty(&context.recordid) {
            Some(id) => {
                let (id, version) = split_version(&id);
                (id, version.or_else(|| non_empty(&context.recordversion)))
            }
            None => (String::new(), non_empty(&context.recordversion)),
        },
    };

    let (resourcename, qualifier) = match parsed.resource {
        Some((name, qualifier)) => (Some(name), qualifier),
        None => (
            non_empty(&context.resourcename),
            non_empty(&context.qualifier),
        ),
    };

    let Some(reftype) = reftype else {
        return Err(grammar_error(
            &reference,
            context,
            "didn't resolve a reference type",
        ));
    };
    if recordid.is_empty() {
        return Err(grammar_error(
            &reference,
            context,
            "didn't resolve a recordid",
        ));
    }

    let components = ReferenceComponents {
        reftype,
        recordid,
        recordversion,
        resourcename,
        qualifier,
    };
    trace!(%reference, %context, resolved = %components, "parsed reference");
    Ok(components)
}

fn parse_text(
    text: &str,
    reference: &RawReference<'_>,
    context: &PartialReference,
) -> Result<Parsed, HepRefError> {
    let mut parsed = Parsed::default();

    if let Some((record, resource)) = text.split_once('/') {
        match record.split_once(':') {
            Some((reftype, id)) => {
                parsed.reftype = non_empty_str(reftype);
                parsed.record = non_empty_str(id).map(|id| split_version(&id));
            }
            None => parsed.record = non_empty_str(record).map(|id| split_version(&id)),
        }
        parsed.resource = match resource.split_once(':') {
            Some((name, qualifier)) => {
                non_empty_str(name).map(|name| (name, non_empty_str(qualifier)))
            }
            None => non_empty_str(resource).map(|name| (name, None)),
        };
    } else if let Some((reftype, id)) = text.split_once(':') {
        if id.contains(':') {
            return Err(grammar_error(
                reference,
                context,
                "contains two colons but no forward slash; expected [<type>:]<id>[/<resource>[:<qualifier>]]",
            ));
        }
        parsed.reftype = non_empty_str(reftype);
        parsed.record = non_empty_str(id).map(|id| split_version(&id));
    } else if let Some(id) = integer_id(text) {
        parsed.record = Some((id, None));
    } else {
        parsed.resource = Some((text.to_string(), None));
    }

    Ok(parsed)
}

/// Canonical form of an integer of any width: optional sign, no leading zeros.
fn integer_id(text: &str) -> Option<String> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let magnitude = digits.trim_start_matches('0');
    Some(match (negative, magnitude.is_empty()) {
        (_, true) => "0".to_string(),
        (true, false) => format!("-{magnitude}"),
        (false, false) => magnitude.to_string(),
    })
}

/// Split `<id>v<version>` on the first `v`.
fn split_version(recordid: &str) -> (String, Option<String>) {
    match recordid.split_once('v') {
        Some((id, version)) => (id.to_string(), non_empty_str(version)),
        None => (recordid.to_string(), None),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().and_then(non_empty_str)
}

fn non_empty_str(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn grammar_error(
    reference: &RawReference<'_>,
    context: &PartialReference,
    message: &str,
) -> HepRefError {
    HepRefError::ReferenceGrammar {
        reference: reference.to_string(),
        context: context.to_string(),
        message: message.to_string(),
    }
}
