mod common;

use common::{FakeCloud, LogCapture, MANAGER_MAC, OTHER_MAC, SUBNET_CIDR, instance, mac};
use mgrboot_cloud::{Network, ResourceType, Role, Subnet};
use mgrboot_core::{
    AddressContainment, BootstrapError, Hop, TopologyResolver, find_instance_by_mac,
};

#[tokio::test]
async fn test_unique_mac_match() {
    let cloud = FakeCloud::fixture();
    let found = find_instance_by_mac(&cloud, &mac(MANAGER_MAC)).await.unwrap();
    assert_eq!(found.id, "srv-mgr");
}

#[tokio::test]
async fn test_mac_match_is_case_insensitive() {
    let cloud = FakeCloud::fixture();
    let found = find_instance_by_mac(&cloud, &mac("FA:16:3E:00:00:01"))
        .await
        .unwrap();
    assert_eq!(found.id, "srv-mgr");
}

#[tokio::test]
async fn test_no_mac_match_is_not_found() {
    let cloud = FakeCloud::fixture();
    let err = find_instance_by_mac(&cloud, &mac("fa:16:3e:ff:ff:ff"))
        .await
        .unwrap_err();
    match err {
        BootstrapError::NotFound { mac: missing } => {
            assert_eq!(missing.to_string(), "fa:16:3e:ff:ff:ff")
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_mac_takes_first_listed() {
    let cloud = FakeCloud::fixture().with_state(|s| {
        s.instances.push(instance("srv-clone", MANAGER_MAC, false));
    });
    let (logs, _guard) = LogCapture::install();

    let found = find_instance_by_mac(&cloud, &mac(MANAGER_MAC)).await.unwrap();
    assert_eq!(found.id, "srv-mgr");

    let warnings = logs.warnings();
    assert_eq!(warnings.len(), 1, "{}", logs.contents());
    assert!(warnings[0].contains("srv-mgr"));
    assert!(warnings[0].contains("srv-clone"));
}

#[tokio::test]
async fn test_unique_mac_logs_no_warning() {
    let cloud = FakeCloud::fixture();
    let (logs, _guard) = LogCapture::install();

    find_instance_by_mac(&cloud, &mac(MANAGER_MAC)).await.unwrap();
    assert!(logs.warnings().is_empty(), "{}", logs.contents());
}

#[tokio::test]
async fn test_instance_listing_failure() {
    let cloud = FakeCloud {
        failing_listing: Some("instances"),
        ..FakeCloud::fixture()
    };
    let err = find_instance_by_mac(&cloud, &mac(OTHER_MAC)).await.unwrap_err();
    assert!(matches!(err, BootstrapError::Cloud(_)));
}

#[tokio::test]
async fn test_full_fixture_resolves_every_role() {
    let cloud = FakeCloud::fixture();
    let manager = instance("srv-mgr", MANAGER_MAC, true);

    let context = TopologyResolver::new(&cloud)
        .build_context(&manager, "agents-kp", "agents-sg")
        .await
        .unwrap();

    assert_eq!(context.len(), 9);
    assert!(context.is_complete());

    let id = |role| context.get(role).unwrap().id.as_str();
    assert_eq!(id(Role::AgentsKeypair), "agents-kp");
    assert_eq!(id(Role::AgentsSecurityGroup), "agents-sg");
    assert_eq!(id(Role::IntNetwork), "net-int");
    assert_eq!(id(Role::ManagementKeypair), "mgmt-key");
    assert_eq!(id(Role::ManagementSecurityGroup), "sg-mgmt");
    assert_eq!(id(Role::Router), "r-1");
    assert_eq!(id(Role::Subnet), "sn-int");
    assert_eq!(id(Role::ExtNetwork), "net-ext");
    assert_eq!(id(Role::FloatingIp), "fip-1");

    assert_eq!(context.subnet_cidr(), Some(SUBNET_CIDR));
    let fip = context.get(Role::FloatingIp).unwrap();
    assert_eq!(fip.resource_type, ResourceType::FloatingIp);
    assert_eq!(fip.extra("ip"), Some(common::FLOATING_ADDR));

    for (role, descriptor) in context.iter() {
        let owned = matches!(role, Role::AgentsKeypair | Role::AgentsSecurityGroup);
        assert_eq!(descriptor.external_resource, !owned, "{}", role);
    }
}

#[tokio::test]
async fn test_without_floating_ip_only_that_role_is_missing() {
    let cloud = FakeCloud::fixture();
    let with_fip = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, true), "agents-kp", "agents-sg")
        .await
        .unwrap();
    let without = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, false), "agents-kp", "agents-sg")
        .await
        .unwrap();

    assert_eq!(without.len(), 8);
    assert!(!without.contains(Role::FloatingIp));
    for role in Role::MANDATORY {
        assert_eq!(without.get(role), with_fip.get(role));
    }
}

#[tokio::test]
async fn test_floating_address_without_provider_object() {
    let cloud = FakeCloud::fixture().with_state(|s| s.floating_ips.clear());
    let err = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, true), "agents-kp", "agents-sg")
        .await
        .unwrap_err();
    assert_eq!(err.hop(), Some(Hop::FloatingIp));
}

#[tokio::test]
async fn test_network_without_router_port() {
    let cloud = FakeCloud::fixture().with_state(|s| s.ports.retain(|p| p.id != "port-ri"));
    let err = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, true), "agents-kp", "agents-sg")
        .await
        .unwrap_err();

    match err {
        BootstrapError::TopologyResolution { hop, reason } => {
            assert_eq!(hop, Hop::RouterInterface);
            assert!(reason.contains("ci-int"));
        }
        other => panic!("expected TopologyResolution, got {:?}", other),
    }
}

#[tokio::test]
async fn test_port_names_unknown_router() {
    let cloud = FakeCloud::fixture().with_state(|s| s.routers.clear());
    let err = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, false), "agents-kp", "agents-sg")
        .await
        .unwrap_err();
    assert_eq!(err.hop(), Some(Hop::Router));
}

#[tokio::test]
async fn test_router_without_gateway() {
    let cloud = FakeCloud::fixture().with_state(|s| {
        s.routers[0].external_gateway_network_id = None;
    });
    let err = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, false), "agents-kp", "agents-sg")
        .await
        .unwrap_err();
    assert_eq!(err.hop(), Some(Hop::ExtNetwork));
}

#[tokio::test]
async fn test_instance_without_security_groups_is_fatal() {
    let cloud = FakeCloud::fixture();
    let mut manager = instance("srv-mgr", MANAGER_MAC, false);
    manager.security_groups.clear();

    let err = TopologyResolver::new(&cloud)
        .build_context(&manager, "agents-kp", "agents-sg")
        .await
        .unwrap_err();
    assert_eq!(err.hop(), Some(Hop::ManagementSecurityGroup));
}

#[tokio::test]
async fn test_instance_without_keypair() {
    let cloud = FakeCloud::fixture();
    let mut manager = instance("srv-mgr", MANAGER_MAC, false);
    manager.key_name = None;

    let err = TopologyResolver::new(&cloud)
        .build_context(&manager, "agents-kp", "agents-sg")
        .await
        .unwrap_err();
    assert_eq!(err.hop(), Some(Hop::ManagementKeypair));
}

#[tokio::test]
async fn test_unknown_network_name() {
    let cloud = FakeCloud::fixture().with_state(|s| s.networks.retain(|n| n.id != "net-int"));
    let err = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, false), "agents-kp", "agents-sg")
        .await
        .unwrap_err();
    assert_eq!(err.hop(), Some(Hop::IntNetwork));
}

#[tokio::test]
async fn test_listing_failure_aborts_resolution() {
    let cloud = FakeCloud {
        failing_listing: Some("routers"),
        ..FakeCloud::fixture()
    };
    let err = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, true), "agents-kp", "agents-sg")
        .await
        .unwrap_err();

    match err {
        BootstrapError::TopologyResolution { hop, reason } => {
            assert_eq!(hop, Hop::Listing);
            assert!(reason.contains("503"));
        }
        other => panic!("expected TopologyResolution, got {:?}", other),
    }
}

#[tokio::test]
async fn test_containment_policy_picks_addressed_subnet() {
    let cloud = FakeCloud::fixture().with_state(|s| {
        s.subnets.push(Subnet {
            id: "sn-spare".to_string(),
            name: "spare".to_string(),
            cidr: "10.9.0.0/24".to_string(),
            network_id: "net-int".to_string(),
        });
        let int = s.networks.iter_mut().find(|n| n.id == "net-int").unwrap();
        int.subnets.insert(0, "sn-spare".to_string());
    });
    let manager = instance("srv-mgr", MANAGER_MAC, false);

    let first = TopologyResolver::new(&cloud)
        .build_context(&manager, "agents-kp", "agents-sg")
        .await
        .unwrap();
    assert_eq!(first.get(Role::Subnet).unwrap().id, "sn-spare");

    let contained = TopologyResolver::new(&cloud)
        .with_policy(&AddressContainment)
        .build_context(&manager, "agents-kp", "agents-sg")
        .await
        .unwrap();
    assert_eq!(contained.get(Role::Subnet).unwrap().id, "sn-int");
    assert_eq!(contained.subnet_cidr(), Some(SUBNET_CIDR));
}

#[tokio::test]
async fn test_context_serializes_in_role_order() {
    let cloud = FakeCloud::fixture();
    let context = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, true), "agents-kp", "agents-sg")
        .await
        .unwrap();

    let json = serde_json::to_value(&context).unwrap();
    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "agents_keypair",
            "agents_security_group",
            "int_network",
            "management_keypair",
            "management_security_group",
            "router",
            "subnet",
            "ext_network",
            "floating_ip",
        ]
    );
    assert_eq!(json["subnet"]["cidr"], SUBNET_CIDR);
    assert_eq!(json["subnet"]["type"], "subnet");
    assert_eq!(json["agents_keypair"]["external_resource"], false);
}

fn with_shadow_network(cidr: &'static str) -> FakeCloud {
    FakeCloud::fixture().with_state(move |s| {
        s.networks.insert(
            0,
            Network {
                id: "net-shadow".to_string(),
                name: "ci-int".to_string(),
                subnets: vec!["sn-shadow".to_string()],
                external: false,
            },
        );
        s.subnets.push(Subnet {
            id: "sn-shadow".to_string(),
            name: "shadow-subnet".to_string(),
            cidr: cidr.to_string(),
            network_id: "net-shadow".to_string(),
        });
    })
}

#[tokio::test]
async fn test_duplicate_network_name_resolved_by_address() {
    let cloud = with_shadow_network("192.168.50.0/24");
    let (logs, _guard) = LogCapture::install();
    let context = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, true), "agents-kp", "agents-sg")
        .await
        .unwrap();

    assert_eq!(context.get(Role::IntNetwork).unwrap().id, "net-int");
    assert_eq!(context.get(Role::Router).unwrap().id, "r-1");
    assert_eq!(context.subnet_cidr(), Some(SUBNET_CIDR));
    assert!(logs.warnings().iter().any(|w| w.contains("net-shadow")));
}

#[tokio::test]
async fn test_duplicate_network_name_without_distinguishing_address() {
    let cloud = with_shadow_network(SUBNET_CIDR);
    let err = TopologyResolver::new(&cloud)
        .build_context(&instance("srv-mgr", MANAGER_MAC, true), "agents-kp", "agents-sg")
        .await
        .unwrap_err();

    match err {
        BootstrapError::TopologyResolution { hop, reason } => {
            assert_eq!(hop, Hop::IntNetwork);
            assert!(reason.contains("ambiguous"));
            assert!(reason.contains("net-shadow"));
        }
        other => panic!("expected TopologyResolution, got {:?}", other),
    }
}
