//! Throwaway RSA key material for unit tests.
//!
//! Keys are generated per test run; nothing here is checked in or reused.

use crate::saml::SigningCredentials;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder};

pub struct TestKeys {
    pub credentials: SigningCredentials,
    pub certificate_pem: String,
}

/// Generate a fresh RSA-2048 key pair and a matching self-signed certificate.
pub fn generate(common_name: &str) -> TestKeys {
    let rsa = Rsa::generate(2048).unwrap();
    let key = PKey::from_rsa(rsa).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    let certificate = builder.build();

    let certificate_pem = String::from_utf8(certificate.to_pem().unwrap()).unwrap();
    let key_pem = String::from_utf8(key.private_key_to_pem_pkcs8().unwrap()).unwrap();
    let credentials = SigningCredentials::from_pem(&certificate_pem, &key_pem).unwrap();

    TestKeys {
        credentials,
        certificate_pem,
    }
}
