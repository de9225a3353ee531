//! TLS negotiation lives outside the crate; its whole TLS surface is the
//! ALPN identifier. Make sure a rustls server config can carry it.

use h2serve::ALPN_H2;
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};

#[test]
fn rustls_server_config_advertises_h2() {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
    let cert_der = CertificateDer::from(cert.cert);

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key.into())
        .unwrap();
    config.alpn_protocols = vec![ALPN_H2.to_vec()];

    assert_eq!(config.alpn_protocols, [b"h2".to_vec()]);
}
