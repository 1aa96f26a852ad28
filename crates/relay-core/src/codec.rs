//! Partner wire codec
//!
//! The partner encodes events as flat, positional, space separated lines with
//! no field names. Tokens are taken strictly by position: an embedded extra
//! space shifts every following field, and surplus trailing tokens are ignored.

use rust_decimal::Decimal;
use std::str::FromStr;
use url::Url;

use crate::error::{RelayError, RelayResult};
use crate::models::{ImageUpdateRequest, UpdateMessage};

const UPDATE_FIELDS: usize = 5;
const IMAGE_REQUEST_FIELDS: usize = 4;

fn split_fields<'a>(line: &'a str, expected: usize, kind: &str) -> RelayResult<Vec<&'a str>> {
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() < expected {
        return Err(RelayError::malformed(format!(
            "{} requires {} space separated fields, got {}: {:?}",
            kind,
            expected,
            fields.len(),
            line
        )));
    }
    if fields.len() > expected {
        tracing::debug!(
            kind = kind,
            fields = fields.len(),
            expected = expected,
            "Ignoring surplus wire fields"
        );
    }
    Ok(fields)
}

/// Decode one partner update line: `branch product quantity units reason`.
pub fn decode_update(line: &str) -> RelayResult<UpdateMessage> {
    let fields = split_fields(line, UPDATE_FIELDS, "update message")?;

    let adjustment_quantity = Decimal::from_str(fields[2]).map_err(|e| {
        RelayError::malformed(format!("invalid adjustment quantity {:?}: {}", fields[2], e))
    })?;

    Ok(UpdateMessage {
        branch_id: fields[0].to_string(),
        product_id: fields[1].to_string(),
        adjustment_quantity,
        adjustment_units: fields[3].to_string(),
        reason_code: fields[4].to_string(),
    })
}

/// Encode an update back into the partner's wire form.
pub fn encode_update(message: &UpdateMessage) -> String {
    format!(
        "{} {} {} {} {}",
        message.branch_id,
        message.product_id,
        format_quantity(message.adjustment_quantity),
        message.adjustment_units,
        message.reason_code
    )
}

/// Render a quantity with at least two integer digits; the fractional part
/// keeps the decimal's own scale.
///
/// TODO: confirm with the partner how negative and fractional quantities are
/// expected on the wire; only integer quantities have been observed so far.
fn format_quantity(quantity: Decimal) -> String {
    let magnitude = quantity.abs().to_string();
    let (integer, fraction) = match magnitude.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (magnitude.as_str(), None),
    };
    let sign = if quantity.is_sign_negative() && !quantity.is_zero() {
        "-"
    } else {
        ""
    };
    match fraction {
        Some(fraction) => format!("{}{:0>2}.{}", sign, integer, fraction),
        None => format!("{}{:0>2}", sign, integer),
    }
}

fn parse_absolute_uri(token: &str, field: &str) -> RelayResult<Url> {
    let url = Url::parse(token)
        .map_err(|e| RelayError::malformed(format!("{} is not an absolute URI {:?}: {}", field, token, e)))?;
    if url.cannot_be_a_base() {
        return Err(RelayError::malformed(format!(
            "{} is not a hierarchical URI: {:?}",
            field, token
        )));
    }
    Ok(url)
}

/// Decode an image update request: `brandUri logoUri productUri productId`.
pub fn decode_image_update_request(line: &str) -> RelayResult<ImageUpdateRequest> {
    let fields = split_fields(line, IMAGE_REQUEST_FIELDS, "image update request")?;

    Ok(ImageUpdateRequest {
        brand_uri: parse_absolute_uri(fields[0], "brand image")?,
        logo_uri: parse_absolute_uri(fields[1], "logo image")?,
        product_uri: parse_absolute_uri(fields[2], "product image")?,
        product_id: fields[3].to_string(),
    })
}

pub fn encode_image_update_request(request: &ImageUpdateRequest) -> String {
    format!(
        "{} {} {} {}",
        request.brand_uri, request.logo_uri, request.product_uri, request.product_id
    )
}
