use std::collections::BTreeMap;

use log::debug;

use crate::descriptor::{ParsedDescriptor, TrailingValue, layout};
use crate::packet::TransferType;

/// What the session has learned about one device from its descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceModel {
    pub address: u8,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub class: Option<(u8, u8, u8)>,
    pub max_packet_size0: Option<u8>,
    pub manufacturer_index: Option<u8>,
    pub product_index: Option<u8>,
    pub configurations: Vec<u8>,
    /// Transfer types keyed by endpoint address (direction bit included).
    pub endpoints: BTreeMap<u8, TransferType>,
    pub strings: BTreeMap<u8, String>,
}

impl DeviceModel {
    fn new(address: u8) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.strings.get(&self.manufacturer_index?).map(String::as_str)
    }

    pub fn product(&self) -> Option<&str> {
        self.strings.get(&self.product_index?).map(String::as_str)
    }

    fn record_device(&mut self, parsed: &ParsedDescriptor) {
        let head = &parsed.head;
        self.vendor_id = head.value("idVendor").or(self.vendor_id);
        self.product_id = head.value("idProduct").or(self.product_id);
        self.max_packet_size0 = head.byte("bMaxPacketSize").or(self.max_packet_size0);
        self.manufacturer_index = head.byte("iManufacturer").filter(|index| *index != 0);
        self.product_index = head.byte("iProduct").filter(|index| *index != 0);
        if let (Some(class), Some(subclass), Some(protocol)) = (
            head.byte("bDeviceClass"),
            head.byte("bDeviceSubclass"),
            head.byte("bDeviceProtocol"),
        ) {
            self.class = Some((class, subclass, protocol));
        }
    }

    fn record_configuration(&mut self, parsed: &ParsedDescriptor) {
        if let Some(value) = parsed.head.byte("bConfigurationValue") {
            if !self.configurations.contains(&value) {
                self.configurations.push(value);
            }
        }
        for endpoint in parsed
            .decoded_subordinates()
            .filter(|decoded| decoded.number == layout::ENDPOINT_DESCRIPTOR)
        {
            if let (Some(address), Some(attributes)) =
                (endpoint.byte("bEndpointAddress"), endpoint.byte("bmAttributes"))
            {
                self.endpoints
                    .insert(address, TransferType::from_attributes(attributes));
            }
        }
    }
}

/// Device models keyed by bus address.
#[derive(Debug, Clone, Default)]
pub struct DeviceModels {
    devices: BTreeMap<u8, DeviceModel>,
}

impl DeviceModels {
    pub fn get(&self, address: u8) -> Option<&DeviceModel> {
        self.devices.get(&address)
    }

    /// Devices in address order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceModel> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Folds a descriptor returned by `address` into its model.
    pub fn record_descriptor(&mut self, address: u8, index: u8, parsed: &ParsedDescriptor) {
        let model = self
            .devices
            .entry(address)
            .or_insert_with(|| DeviceModel::new(address));
        match parsed.head.number {
            layout::DEVICE_DESCRIPTOR => model.record_device(parsed),
            layout::CONFIGURATION_DESCRIPTOR => model.record_configuration(parsed),
            layout::STRING_DESCRIPTOR => {
                if let Some(TrailingValue::Text(text)) = &parsed.head.trailing {
                    model.strings.insert(index, text.clone());
                }
            }
            _ => return,
        }
        debug!(
            "device {address}: recorded {} descriptor #{index}",
            parsed.head.name
        );
    }

    /// Declared transfer type of a non-control endpoint, when known.
    pub fn transfer_type(&self, address: u8, endpoint_address: u8) -> Option<TransferType> {
        self.devices.get(&address)?.endpoints.get(&endpoint_address).copied()
    }
}
