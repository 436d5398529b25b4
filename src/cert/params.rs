use std::net::IpAddr;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, PrintableStringRef, SetOfVec};
use der::flagset::FlagSet;
use der::{Tag, Tagged};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::KeyUsages;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::error::{CertMintError, Result};
use crate::key::PublicKey;

/// What an issuer needs to know about the certificate it is asked to sign.
///
/// # Fields
/// * `subject` - Encoded subject name, copied verbatim into the certificate.
/// * `subject_public_key` - The key being certified.
/// * `usages` - ExtendedKeyUsage purposes. Left out of the certificate when empty.
/// * `key_usage` - KeyUsage flags. Left out of the certificate when empty.
/// * `is_ca` - Value of the BasicConstraints `cA` flag.
/// * `subject_alt_names` - DNS names and IP addresses for the SubjectAltName extension.
/// * `extensions` - Extra extensions, appended after the standard profile.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: Name,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub key_usage: FlagSet<KeyUsages>,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default)]
    pub subject_alt_names: Vec<SanEntry>,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// One entry of a SubjectAltName extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SanEntry {
    Dns(String),
    Ip(IpAddr),
}

/// A subject or issuer identity, attribute by attribute.
///
/// Unset and empty attributes are left out of the encoded name. Attributes are encoded
/// one per RDN in the order C, ST, L, STREET, postalCode, O, OU, CN.
///
/// # Fields
/// * `common_name` - CN, e.g. a device identifier.
/// * `country` - C, a two-letter code.
/// * `state` - ST.
/// * `locality` - L.
/// * `street_address` - STREET.
/// * `postal_code` - postalCode.
/// * `organization` - O.
/// * `organization_unit` - OU.
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub street_address: Option<String>,
    pub postal_code: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// The placeholder identity used when no subject is configured.
    pub fn placeholder() -> Self {
        DistinguishedName {
            common_name: None,
            country: Some("US".to_string()),
            state: None,
            locality: Some("San Francisco".to_string()),
            street_address: Some("Golden Gate Bridge".to_string()),
            postal_code: Some("94016".to_string()),
            organization: Some("Company, INC.".to_string()),
            organization_unit: None,
        }
    }

    /// Encodes the identity as an X.509 `Name`.
    ///
    /// The country is encoded as a PrintableString, every other attribute as a
    /// UTF8String.
    pub fn as_x509_name(&self) -> Result<Name> {
        let attributes = [
            (const_oid::db::rfc4519::C, &self.country),
            (const_oid::db::rfc4519::ST, &self.state),
            (const_oid::db::rfc4519::L, &self.locality),
            (const_oid::db::rfc4519::STREET, &self.street_address),
            (const_oid::db::rfc4519::POSTAL_CODE, &self.postal_code),
            (const_oid::db::rfc4519::O, &self.organization),
            (const_oid::db::rfc4519::OU, &self.organization_unit),
            (const_oid::db::rfc4519::CN, &self.common_name),
        ];

        let mut rdns = Vec::new();
        for (oid, value) in attributes {
            let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            let invalid = |e: der::Error| {
                CertMintError::InvalidInput(format!("name attribute {oid}: {e}"))
            };
            let value = if oid == const_oid::db::rfc4519::C {
                PrintableStringRef::new(value).map_err(invalid)?;
                Any::new(Tag::PrintableString, value.as_bytes())
            } else {
                Any::new(Tag::Utf8String, value.as_bytes())
            }
            .map_err(invalid)?;

            let mut set = SetOfVec::new();
            set.insert_ordered(AttributeTypeAndValue { oid, value })
                .map_err(invalid)?;
            rdns.push(RelativeDistinguishedName::from(set));
        }
        Ok(RdnSequence(rdns))
    }

    /// Reads an identity back out of an X.509 `Name`.
    ///
    /// Attributes this type does not model, and values that are not strings, are skipped.
    pub fn from_x509_name(name: &Name) -> Self {
        let mut dn = DistinguishedName::default();
        for attr in name.0.iter().flat_map(|rdn| rdn.0.iter()) {
            let Some(value) = attribute_string(&attr.value) else {
                continue;
            };
            let slot = match attr.oid {
                const_oid::db::rfc4519::CN => &mut dn.common_name,
                const_oid::db::rfc4519::C => &mut dn.country,
                const_oid::db::rfc4519::ST => &mut dn.state,
                const_oid::db::rfc4519::L => &mut dn.locality,
                const_oid::db::rfc4519::STREET => &mut dn.street_address,
                const_oid::db::rfc4519::POSTAL_CODE => &mut dn.postal_code,
                const_oid::db::rfc4519::O => &mut dn.organization,
                const_oid::db::rfc4519::OU => &mut dn.organization_unit,
                _ => continue,
            };
            *slot = Some(value);
        }
        dn
    }
}

fn attribute_string(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            std::str::from_utf8(value.value()).ok().map(str::to_owned)
        }
        _ => None,
    }
}

/// The `notBefore`/`notAfter` window of a certificate, in UTC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// From now until `days` days from now.
    pub fn for_days(days: i64) -> Self {
        let not_before = OffsetDateTime::now_utc();
        Self {
            not_before,
            not_after: not_before + Duration::days(days),
        }
    }

    /// Creates a validity period starting now for the given number of calendar years.
    ///
    /// A start on February 29th ends on February 28th of the target year.
    pub fn for_years(years: u16) -> Result<Self> {
        let now = OffsetDateTime::now_utc();
        Ok(Self {
            not_before: now,
            not_after: add_years(now, years)?,
        })
    }

    /// Shortens the period so it ends no later than `limit`.
    ///
    /// Returns `true` when the period was shortened.
    pub fn clamp_to(&mut self, limit: OffsetDateTime) -> bool {
        if self.not_after > limit {
            self.not_after = limit;
            true
        } else {
            false
        }
    }

    /// Returns `true` if `instant` falls inside `[not_before, not_after)`.
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.not_before <= instant && instant < self.not_after
    }
}

fn add_years(start: OffsetDateTime, years: u16) -> Result<OffsetDateTime> {
    let year = start.year() + i32::from(years);
    start
        .replace_year(year)
        .or_else(|_| start.replace_day(28).and_then(|d| d.replace_year(year)))
        .map_err(|e| CertMintError::InvalidInput(format!("validity of {years} years: {e}")))
}

/// An encoded extension, ready to be placed in a certificate.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// Contents of `extnValue`
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Encodes `extension`, marking it `critical` or not.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }
}
