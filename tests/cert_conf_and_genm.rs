//! Black-box coverage of certificate confirmation preconditions and the
//! general message (GENM/GENP) ITAV round trip.

mod common;

use cmp_engine::prelude::*;
use common::*;

#[tokio::test]
async fn cert_conf_with_nothing_to_confirm_fails_without_sending() {
    let server = server_issuing(vec![1]);
    let mut ctx = client_context(server, EndpointOptions::default());

    let result = exchange_cert_conf(&mut ctx).await;

    assert!(matches!(result, Err(CmpError::ErrorCreatingCertConf(_))));
    assert!(!ctx.cert_conf_sent(), "a failed build must not mark confirmation as sent");
}

#[tokio::test]
async fn genm_round_trips_arbitrary_itavs_through_the_server() {
    let server = server_issuing(vec![1]);
    let mut ctx = client_context(server, EndpointOptions::default());

    let itavs = vec![
        Itav { infotype: Oid("1.3.6.1.5.5.7.4.1".into()), infovalue: None },
        Itav { infotype: Oid("1.3.6.1.5.5.7.4.2".into()), infovalue: Some(vec![1, 2, 3]) },
    ];

    let echoed = exec_genm(&mut ctx, itavs.clone()).await.expect("GENM should round trip");
    assert_eq!(echoed, itavs);
}

#[tokio::test]
async fn p10cr_transaction_obtains_a_certificate() {
    let server = server_issuing(vec![0x99]);
    let mut ctx = client_context(server, EndpointOptions::default());

    let csr = Csr::from_der(vec![0x30, 0x00]);
    exec_p10cr(&mut ctx, csr).await.expect("P10CR should succeed");

    assert_eq!(ctx.new_cert().unwrap().der(), &[0x99]);
}
