use crate::helpers::utc;
use report_queue::RotatingProfileIdentity;

#[test]
fn identity_is_kept_within_month_and_replaced_after() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("profile-identity.json");

    let first =
        RotatingProfileIdentity::load_and_rotate(&path, &utc(2025, 1, 31, 23, 0)).unwrap();
    assert_eq!(first.id_month, "2025-1");

    let restart =
        RotatingProfileIdentity::load_and_rotate(&path, &utc(2025, 1, 31, 23, 59)).unwrap();
    assert_eq!(restart, first);

    let february =
        RotatingProfileIdentity::load_and_rotate(&path, &utc(2025, 2, 1, 0, 1)).unwrap();
    assert_eq!(february.id_month, "2025-2");
    assert_ne!(february.id, first.id);
}

#[test]
fn corrupt_identity_file_is_regenerated() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("profile-identity.json");
    std::fs::write(&path, "{\"id\": 42}").unwrap();

    let identity =
        RotatingProfileIdentity::load_and_rotate(&path, &utc(2025, 3, 3, 3, 0)).unwrap();
    assert_eq!(identity.id.len(), 32);
    assert_eq!(RotatingProfileIdentity::load(&path), Some(identity));
}
