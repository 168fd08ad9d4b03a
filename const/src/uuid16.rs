uuid16_enum! {
    /// GATT attribute type declarations ([Vol 3] Part G, Section 3.1-3.3).
    pub enum Declaration {
        PrimaryService = 0x2800,
        SecondaryService = 0x2801,
        Include = 0x2802,
        Characteristic = 0x2803,
    }
}

uuid16_enum! {
    /// GATT characteristic descriptors ([Vol 3] Part G, Section 3.3.3).
    pub enum Descriptor {
        CharacteristicExtendedProperties = 0x2900,
        CharacteristicUserDescription = 0x2901,
        ClientCharacteristicConfiguration = 0x2902,
        ServerCharacteristicConfiguration = 0x2903,
        CharacteristicPresentationFormat = 0x2904,
        CharacteristicAggregateFormat = 0x2905,
    }
}

uuid16_enum! {
    /// Assigned GATT services.
    pub enum Service {
        GenericAccess = 0x1800,
        GenericAttribute = 0x1801,
        DeviceInformation = 0x180A,
        HeartRate = 0x180D,
        Battery = 0x180F,
    }
}

uuid16_enum! {
    /// Assigned GATT characteristics.
    pub enum Characteristic {
        DeviceName = 0x2A00,
        Appearance = 0x2A01,
        ServiceChanged = 0x2A05,
        BatteryLevel = 0x2A19,
        HeartRateMeasurement = 0x2A37,
    }
}
