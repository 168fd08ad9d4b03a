use warble_const::{Characteristic as Chr, Service as Svc};

use super::*;

const CUSTOM_SVC: u128 = 0x1234_5678_9ABC_DEF0_0FED_CBA9_8765_0000;
const CUSTOM_CHR: u128 = 0x1234_5678_9ABC_DEF0_0FED_CBA9_8765_4321;

fn uuid(v: u128) -> Uuid {
    Uuid::new(v).unwrap()
}

fn hdl(h: u16) -> Handle {
    Handle::new(h).unwrap()
}

fn sample() -> Builder<Table> {
    let mut b = Table::build();
    b.primary_service(Svc::Battery, |b| {
        b.characteristic(Chr::BatteryLevel, Prop::READ | Prop::NOTIFY, |b| {
            b.value([100]);
        });
    });
    b.primary_service(uuid(CUSTOM_SVC), |b| {
        b.characteristic(uuid(CUSTOM_CHR), Prop::WRITE | Prop::INDICATE, |b| {
            b.client_cfg();
            b.descriptor(Desc::CharacteristicUserDescription, "echo");
        });
        b.characteristic(Chr::DeviceName, Prop::READ, |_| {});
    });
    b
}

#[test]
fn handle_layout() {
    let t = sample().freeze().unwrap();
    t.dump();
    assert_eq!(t.len(), 11);
    let typ: Vec<Uuid> = (1..=11).map(|h| t.lookup(hdl(h)).unwrap().typ()).collect();
    assert_eq!(
        typ,
        [
            Declaration::PrimaryService.uuid(),
            Declaration::Characteristic.uuid(),
            Chr::BatteryLevel.uuid(),
            Desc::ClientCharacteristicConfiguration.uuid(),
            Declaration::PrimaryService.uuid(),
            Declaration::Characteristic.uuid(),
            uuid(CUSTOM_CHR),
            Desc::ClientCharacteristicConfiguration.uuid(),
            Desc::CharacteristicUserDescription.uuid(),
            Declaration::Characteristic.uuid(),
            Chr::DeviceName.uuid(),
        ]
    );
    for h in 1..=11 {
        assert_eq!(t.lookup(hdl(h)).unwrap().handle(), hdl(h));
    }
    let svc: Vec<_> = t.services().map(Service::range).collect();
    assert_eq!(svc[0], HandleRange::new(hdl(1), hdl(4)));
    assert_eq!(svc[1], HandleRange::new(hdl(5), hdl(11)));
    assert!(matches!(t.lookup(hdl(12)), Err(Error::NotFound(Lookup::Handle(h))) if h == hdl(12)));
}

#[test]
fn stable_handles() {
    let (a, b) = (sample().freeze().unwrap(), sample().freeze().unwrap());
    let ha: Vec<_> = a.characteristics().map(|c| (c.uuid(), c.handle(), c.cccd())).collect();
    let hb: Vec<_> = b.characteristics().map(|c| (c.uuid(), c.handle(), c.cccd())).collect();
    assert_eq!(ha, hb);
    assert_eq!(ha[0].1, hdl(3));
    assert_eq!(ha[0].2, Some(hdl(4)));
}

#[test]
fn lookup_by_uuid() {
    let t = sample().freeze().unwrap();
    let at = t.lookup_by_uuid(uuid(CUSTOM_SVC), uuid(CUSTOM_CHR)).unwrap();
    assert!(matches!(at, AttributeRef::Value(c) if c.handle() == hdl(7)));
    assert!(matches!(
        t.lookup_by_uuid(Svc::Battery, uuid(CUSTOM_CHR)),
        Err(Error::NotFound(Lookup::Uuid { .. }))
    ));
    assert!(matches!(
        t.lookup_by_uuid(Svc::HeartRate, Chr::BatteryLevel),
        Err(Error::NotFound(_))
    ));
    assert!(t.characteristic(hdl(3)).is_ok());
    assert!(matches!(t.characteristic(hdl(2)), Err(Error::NotFound(_))));
}

#[test]
fn declaration_values() {
    let t = sample().freeze().unwrap();
    assert_eq!(t.services().next().unwrap().decl_value(), [0x0F, 0x18]);
    let c = t.characteristic(hdl(3)).unwrap();
    assert_eq!(c.decl_value(), [0x12, 0x03, 0x00, 0x19, 0x2A]);
    let c = t.characteristic(hdl(7)).unwrap();
    let v = c.decl_value();
    assert_eq!(v.len(), 1 + 2 + 16);
    assert_eq!(&v[..3], &[0x28, 0x07, 0x00]);
    assert_eq!(v[3..], uuid(CUSTOM_CHR).to_bytes());
    assert_eq!(c.descriptors()[1].value(), b"echo");
    assert_eq!(t.characteristic(hdl(3)).unwrap().value(), [100]);
}

#[test]
fn short_uuid_alias() {
    // Vendor UUIDs on the Bluetooth Base UUID use the 16-bit form
    let mut b = Table::build();
    b.primary_service(uuid(0x0000_AB00_0000_1000_8000_00805F9B34FB), |b| {
        b.characteristic(uuid(0x0000_AB01_0000_1000_8000_00805F9B34FB), Prop::READ, |_| {});
    });
    let t = b.freeze().unwrap();
    assert_eq!(t.services().next().unwrap().decl_value(), [0x00, 0xAB]);
    let c = t.characteristic(hdl(3)).unwrap();
    assert_eq!(c.decl_value(), [0x02, 0x03, 0x00, 0x01, 0xAB]);
    assert_eq!(c.decl_value().len(), 1 + 2 + 2);
}

#[test]
fn duplicate_uuid() {
    let mut b = Table::build();
    b.primary_service(Svc::Battery, |b| {
        b.characteristic(Chr::BatteryLevel, Prop::READ, |_| {});
        b.characteristic(Chr::BatteryLevel, Prop::READ, |_| {});
    });
    assert!(matches!(b.freeze(), Err(Error::DuplicateUuid(u)) if u == Chr::BatteryLevel));

    let mut b = Table::build();
    b.primary_service(Svc::Battery, |_| {});
    b.primary_service(Svc::Battery, |_| {});
    assert!(matches!(b.freeze(), Err(Error::DuplicateUuid(u)) if u == Svc::Battery));

    // Same characteristic in different services is fine
    let mut b = Table::build();
    b.primary_service(Svc::Battery, |b| {
        b.characteristic(Chr::BatteryLevel, Prop::READ, |_| {});
    });
    b.primary_service(Svc::DeviceInformation, |b| {
        b.characteristic(Chr::BatteryLevel, Prop::READ, |_| {});
    });
    assert!(b.freeze().is_ok());
}

#[test]
fn invalid_cccd() {
    let mut b = Table::build();
    b.primary_service(Svc::Battery, |b| {
        b.characteristic(Chr::BatteryLevel, Prop::READ, |b| {
            b.client_cfg();
        });
    });
    assert!(matches!(b.freeze(), Err(Error::InvalidDescriptor { .. })));

    let mut b = Table::build();
    b.primary_service(Svc::Battery, |b| {
        b.characteristic(Chr::BatteryLevel, Prop::NOTIFY, |b| {
            b.client_cfg();
            b.descriptor(Desc::ClientCharacteristicConfiguration, [0, 0]);
        });
    });
    assert!(matches!(b.freeze(), Err(Error::InvalidDescriptor { .. })));
}

#[test]
fn invalid_handler() {
    let mut b = Table::build();
    b.primary_service(Svc::Battery, |b| {
        b.characteristic(Chr::BatteryLevel, Prop::READ, |b| {
            b.on_write(|_: WriteReq| -> IoResult<()> { Ok(()) });
        });
    });
    assert!(matches!(
        b.freeze(),
        Err(Error::InvalidHandler {
            access: Access::Write,
            ..
        })
    ));
}
