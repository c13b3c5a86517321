//! Lifecycle checks through the façade crate: sign, inspect, unsign.

use sigtuna::crypto::sign::SigningKey;
use sigtuna::crypto::HashAlgorithm;
use sigtuna::dsig::{sign_package, signatures};
use sigtuna::keys::SigningIdentity;
use sigtuna::opc::{FileMode, Package};
use std::io::Write;
use std::path::PathBuf;

fn sample_vsix(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("tool.vsix");
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(br#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="vsixmanifest" ContentType="text/xml"/>
</Types>"#).unwrap();

    writer.start_file("_rels/.rels", options).unwrap();
    writer.write_all(br#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="R1" Type="http://schemas.microsoft.com/visualstudio/2010/manifest" Target="/extension.vsixmanifest"/>
</Relationships>"#).unwrap();

    writer.start_file("extension.vsixmanifest", options).unwrap();
    writer
        .write_all(br#"<PackageManifest Version="2.0.0"/>"#)
        .unwrap();

    writer.finish().unwrap();
    path
}

fn identity() -> SigningIdentity {
    let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
    SigningIdentity::new(SigningKey::EcP256(sk), vec![b"test-cert".to_vec()]).unwrap()
}

#[test]
fn sign_inspect_unsign_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_vsix(&dir);

    let mut package = Package::open(&path, FileMode::ReadWrite).unwrap();
    sign_package(&mut package, &identity(), HashAlgorithm::Sha256).unwrap();
    package.flush().unwrap();

    let package = Package::open(&path, FileMode::ReadOnly).unwrap();
    let sigs = signatures(&package).unwrap();
    assert_eq!(sigs.len(), 1);
    assert!(sigs[0].signing_time().unwrap().is_some());
    assert_eq!(sigs[0].certificates().unwrap(), vec![b"test-cert".to_vec()]);
    drop(package);

    let mut package = Package::open(&path, FileMode::ReadWrite).unwrap();
    let mut sigs = signatures(&package).unwrap();
    for sig in &mut sigs {
        sig.remove(&mut package).unwrap();
    }
    package.flush().unwrap();

    let package = Package::open(&path, FileMode::ReadOnly).unwrap();
    assert!(signatures(&package).unwrap().is_empty());
    // Payload parts survive the unsign untouched.
    assert_eq!(
        package.read_part("/extension.vsixmanifest").unwrap(),
        br#"<PackageManifest Version="2.0.0"/>"#
    );
}
