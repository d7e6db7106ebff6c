use super::*;

#[test]
fn checksum_is_hex_sha256() {
    assert_eq!(
        compute_checksum("abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn equal_batches_hash_equal() {
    let a = vec![RawRecord::new("1465011", "MUNICIPAL", 2023, "150")];
    let b = vec![RawRecord::new("1465011", "MUNICIPAL", 2023, "150")];
    assert_eq!(records_checksum(&a).unwrap(), records_checksum(&b).unwrap());
}

#[test]
fn record_order_changes_hash() {
    let first = RawRecord::new("1465011", "MUNICIPAL", 2022, "100");
    let second = RawRecord::new("1465011", "MUNICIPAL", 2023, "150");
    let forward = records_checksum(&[first.clone(), second.clone()]).unwrap();
    let reversed = records_checksum(&[second, first]).unwrap();
    assert_ne!(forward, reversed);
}

#[test]
fn value_change_changes_hash() {
    let a = [RawRecord::new("1465011", "MUNICIPAL", 2023, "150")];
    let b = [RawRecord::new("1465011", "MUNICIPAL", 2023, "150.5")];
    assert_ne!(records_checksum(&a).unwrap(), records_checksum(&b).unwrap());
}
