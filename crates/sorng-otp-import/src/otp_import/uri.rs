//! `otpauth://` URI parsing and generation per the Google Authenticator
//! key-URI format:
//! <https://github.com/google/google-authenticator/wiki/Key-Uri-Format>
//!
//! Format: `otpauth://totp/ISSUER:NAME?secret=BASE32&issuer=ISSUER&algorithm=SHA1&digits=6&period=30`
//!
//! Only the `totp` type is recovered; `hotp` and anything else is rejected.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::otp_import::error::OtpError;
use crate::otp_import::types::*;

/// Largest digit count whose modulus still fits the 31-bit truncated value.
pub const MAX_DIGITS: u8 = 10;

/// Characters left unescaped in labels and parameter values.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Parse
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse an `otpauth://totp/…` URI into [`OtpParams`].
pub fn parse_otpauth_uri(uri: &str) -> Result<OtpParams, OtpError> {
    let url = url::Url::parse(uri.trim())
        .map_err(|e| OtpError::invalid_uri(format!("Invalid URI: {}", e)))?;

    if !url.scheme().eq_ignore_ascii_case("otpauth") {
        return Err(OtpError::invalid_uri(format!(
            "Expected scheme 'otpauth', got '{}'",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(t) if t.eq_ignore_ascii_case("totp") => {}
        other => {
            return Err(OtpError::invalid_uri(format!(
                "Unsupported OTP type: {:?}",
                other
            )))
        }
    }

    // Path is "/NAME" or "/ISSUER:NAME"
    let path = url.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    let label = percent_decode_str(path)
        .decode_utf8()
        .map_err(|e| OtpError::invalid_uri(format!("Label is not valid UTF-8: {}", e)))?;

    let (label_issuer, name) = match label.split_once(':') {
        Some((issuer, name)) => (issuer.trim().to_string(), name.trim().to_string()),
        None => (String::new(), label.trim().to_string()),
    };

    let mut secret = None;
    let mut param_issuer = None;
    let mut algorithm = Algorithm::default();
    let mut digits = DEFAULT_DIGITS;
    let mut period = DEFAULT_PERIOD;

    for (key, value) in url.query_pairs() {
        match key.to_ascii_lowercase().as_str() {
            "secret" => secret = Some(value.into_owned()),
            "issuer" => param_issuer = Some(value.trim().to_string()),
            "algorithm" => match Algorithm::from_str_loose(&value) {
                Some(algo) => algorithm = algo,
                None => log::debug!("unrecognised algorithm {:?}, using SHA1", value),
            },
            "digits" => match value.trim().parse::<u8>() {
                Ok(d) if (1..=MAX_DIGITS).contains(&d) => digits = d,
                _ => log::debug!("invalid digits {:?}, using {}", value, DEFAULT_DIGITS),
            },
            "period" => match value.trim().parse::<u32>() {
                Ok(p) if p > 0 => period = p,
                _ => log::debug!("invalid period {:?}, using {}", value, DEFAULT_PERIOD),
            },
            _ => {} // ignore unknown params
        }
    }

    let secret = secret
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| OtpError::invalid_uri("Missing 'secret' parameter"))?;

    // An explicit issuer parameter wins over the label prefix.
    let issuer = match param_issuer {
        Some(iss) if !iss.is_empty() => iss,
        _ => label_issuer,
    };

    Ok(OtpParams {
        name,
        issuer,
        secret,
        algorithm,
        digits,
        period,
    })
}

/// Parse multiple URIs (one per line), skipping blanks and comments.
pub fn parse_otpauth_uris(text: &str) -> Vec<Result<OtpParams, OtpError>> {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(parse_otpauth_uri)
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build an `otpauth://totp/…` URI for an account, secret unchanged.
pub fn build_otpauth_uri(account: &Account) -> String {
    let name = encode_component(&account.name);
    let path = if account.issuer.is_empty() {
        name
    } else {
        format!("{}:{}", encode_component(&account.issuer), name)
    };

    let mut params = vec![format!("secret={}", encode_component(&account.secret))];
    if !account.issuer.is_empty() {
        params.push(format!("issuer={}", encode_component(&account.issuer)));
    }
    if account.algorithm != Algorithm::Sha1 {
        params.push(format!("algorithm={}", account.algorithm.uri_name()));
    }
    if account.digits != DEFAULT_DIGITS {
        params.push(format!("digits={}", account.digits));
    }
    if account.period != DEFAULT_PERIOD {
        params.push(format!("period={}", account.period));
    }

    format!("otpauth://totp/{}?{}", path, params.join("&"))
}

fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, URI_COMPONENT).to_string()
}
