use super::transfer::ControlTransfer;
use crate::descriptor::ParsedDescriptor;

/// Fields derived from a standard request's setup stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StandardRequestKind {
    GetStatus,
    ClearFeature { feature_selector: u16 },
    SetFeature { feature_selector: u16 },
    SetAddress { new_address: u16 },
    GetDescriptor {
        descriptor_number: u8,
        descriptor_index: u8,
        language_id: u16,
    },
    SetDescriptor {
        descriptor_number: u8,
        descriptor_index: u8,
    },
    GetConfiguration,
    SetConfiguration { configuration_number: u16 },
    GetInterface { interface: u16 },
    SetInterface { interface: u16, alternate_setting: u16 },
    SynchFrame { endpoint: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandardRequest {
    pub transfer: ControlTransfer,
    pub name: &'static str,
    pub kind: StandardRequestKind,
}

impl StandardRequest {
    pub fn descriptor_target(&self) -> Option<(u8, u8)> {
        match self.kind {
            StandardRequestKind::GetDescriptor {
                descriptor_number,
                descriptor_index,
                ..
            } => Some((descriptor_number, descriptor_index)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorPayload {
    Parsed(ParsedDescriptor),
    Failed(String),
    /// The request completed without a data stage.
    Missing,
}

/// A GET_DESCRIPTOR request with its response decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorRequest {
    pub request: StandardRequest,
    pub descriptor_name: &'static str,
    pub payload: DescriptorPayload,
}

impl DescriptorRequest {
    pub fn descriptor(&self) -> Option<&ParsedDescriptor> {
        match &self.payload {
            DescriptorPayload::Parsed(parsed) => Some(parsed),
            _ => None,
        }
    }
}
