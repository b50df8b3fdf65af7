//! Turning a sensed response into a typed tag session.
//!
//! The family is decided from the shape of the discovery response, in this
//! priority order:
//!
//! 1. FeliCa poll answer → Type 3
//! 2. select answer → Type 4A or 4B, by the profile's modulation
//! 3. ISO 15693 inventory answer → Type 5
//! 4. anticollision answer only → Type 1 if the handshake reports a Topaz
//!    header ROM (`HR0` high nibble `0x1`), Type 2 otherwise
//!
//! A target with none of these responses that still completes the driver
//! handshake becomes [`ActivatedTag::Unknown`].

use tagscan_core::{
    Modulation, ResponseSignature,
    constants::{FELICA_IDM_LENGTH, ISO14443_ID_LENGTHS, ISO15693_UID_LENGTH, TOPAZ_HR0_NIBBLE},
    hex_upper,
};
use tagscan_hardware::{ActivationError, ContactlessReader, SensedTarget, TagHandle, TagHandshake};
use tracing::debug;

use crate::tag::{ActivatedTag, TagBase};

/// Response shape of a sensed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Felica,
    IsoDepA,
    IsoDepB,
    Vicinity,
    Anticollision,
}

fn shape_of(target: &SensedTarget) -> Result<Option<Shape>, ActivationError> {
    if target.sensf_res.is_some() {
        return Ok(Some(Shape::Felica));
    }
    if target.sel_res.is_some() {
        return match target.profile.modulation() {
            Modulation::A => Ok(Some(Shape::IsoDepA)),
            Modulation::B => Ok(Some(Shape::IsoDepB)),
            other => Err(ActivationError::unsupported(format!(
                "select answer on a {} profile",
                other.letter()
            ))),
        };
    }
    if target.inventory_res.is_some() {
        return Ok(Some(Shape::Vicinity));
    }
    if target.sdd_res.is_some() {
        return Ok(Some(Shape::Anticollision));
    }
    Ok(None)
}

/// Identifier the handshake reported, or the one carried by the response.
fn identifier_of(shape: Shape, target: &SensedTarget, handshake: &TagHandshake) -> Vec<u8> {
    if !handshake.identifier.as_slice().is_empty() {
        return handshake.identifier.0.clone();
    }
    let from_response = match shape {
        // SENSF_RES: response code, then IDm
        Shape::Felica => target
            .sensf_res
            .as_deref()
            .and_then(|res| res.get(1..1 + FELICA_IDM_LENGTH)),
        // Inventory response: DSFID, then UID
        Shape::Vicinity => target
            .inventory_res
            .as_deref()
            .and_then(|res| res.get(1..1 + ISO15693_UID_LENGTH)),
        Shape::Anticollision | Shape::IsoDepA => target.sdd_res.as_deref(),
        Shape::IsoDepB => None,
    };
    from_response.map(<[u8]>::to_vec).unwrap_or_default()
}

fn check_identifier(shape: Shape, identifier: &[u8]) -> Result<(), ActivationError> {
    let valid = match shape {
        Shape::Felica => identifier.len() == FELICA_IDM_LENGTH,
        Shape::Vicinity => identifier.len() == ISO15693_UID_LENGTH,
        Shape::IsoDepA | Shape::IsoDepB | Shape::Anticollision => {
            ISO14443_ID_LENGTHS.contains(&identifier.len())
        }
    };
    if valid {
        Ok(())
    } else {
        Err(ActivationError::malformed(format!(
            "identifier {} has invalid length {}",
            hex_upper(identifier),
            identifier.len()
        )))
    }
}

fn is_topaz(handshake: &TagHandshake) -> bool {
    handshake
        .header_rom
        .is_some_and(|[hr0, _]| hr0 & 0xF0 == TOPAZ_HR0_NIBBLE)
}

/// Activate `target` into a tag session.
///
/// # Errors
///
/// - `ActivationError::Unsupported` if the driver has no handshake for the
///   target, or a select answer arrives on a non A/B profile.
/// - `ActivationError::Protocol` if the tag rejects the handshake.
/// - `ActivationError::MalformedResponse` if the identifier has an invalid
///   length for its family.
/// - `ActivationError::Reader` on reader failure.
pub async fn activate<R: ContactlessReader>(
    reader: &mut R,
    target: &SensedTarget,
) -> Result<ActivatedTag, ActivationError> {
    let shape = shape_of(target)?;
    let handshake = reader.activate(target).await?;

    let Some(shape) = shape else {
        debug!("No family matches the response from {}", target);
        let identifier = handshake.identifier.0;
        return Ok(ActivatedTag::Unknown {
            technology: target.technology(),
            identifier: (!identifier.is_empty()).then_some(identifier),
        });
    };

    let identifier = identifier_of(shape, target, &handshake);
    check_identifier(shape, &identifier)?;

    let handle = TagHandle {
        technology: target.technology(),
        identifier: identifier.into(),
    };
    let base = TagBase::new(handle).with_manufacturer(handshake.manufacturer);

    let tag = match shape {
        Shape::Felica => ActivatedTag::Type3 {
            base,
            system_code: handshake.system_code,
            service_codes: handshake.service_codes,
            dumpable: handshake.dumpable,
        },
        Shape::IsoDepA | Shape::IsoDepB => {
            let sel_res = target.sel_res.clone().unwrap_or_default();
            let base = base.with_presence_signature(ResponseSignature::Select(sel_res));
            if shape == Shape::IsoDepA {
                ActivatedTag::Type4A { base }
            } else {
                ActivatedTag::Type4B {
                    base,
                    memory_size: handshake.memory_size.unwrap_or(0),
                    dumpable: handshake.dumpable,
                }
            }
        }
        Shape::Vicinity => ActivatedTag::Type5 {
            base,
            block_size: handshake.block_size.unwrap_or(0),
            block_count: handshake.block_count.unwrap_or(0),
            dumpable: handshake.dumpable,
        },
        Shape::Anticollision => {
            let sdd_res = target.sdd_res.clone().unwrap_or_default();
            let base = base.with_presence_signature(ResponseSignature::Anticollision(sdd_res));
            let memory_size = handshake.memory_size.unwrap_or(0);
            match handshake.header_rom {
                Some(header_rom) if is_topaz(&handshake) => ActivatedTag::Type1 {
                    base,
                    header_rom,
                    memory_size,
                    dumpable: handshake.dumpable,
                },
                _ => ActivatedTag::Type2 {
                    base,
                    memory_size,
                    dumpable: handshake.dumpable,
                },
            }
        }
    };

    debug!(
        "Activated {} {}",
        tag.family(),
        hex_upper(tag.identifier())
    );
    Ok(tag)
}
