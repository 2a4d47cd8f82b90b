#[cfg(test)]
mod reconcile_scenarios {
    use std::collections::BTreeSet;
    use std::fs;
    use std::io::Write;
    use std::net::Ipv4Addr;

    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use tempfile::{NamedTempFile, TempDir};

    use ipreconcile::collector::{Collection, SnapshotCollector};
    use ipreconcile::config::{Config, PoolKind};
    use ipreconcile::config_loader::load_config;
    use ipreconcile::error::WarningKind;
    use ipreconcile::ip::{AddressMath, GatewayPolicy, NetworkPool, PoolRegistry};
    use ipreconcile::reconcile::{
        AddressAllocation, CollectionStatus, ConflictKind, Reconciler, UtilizationReport,
    };

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn pool(cloud: &str, name: &str, cidr: &str) -> NetworkPool {
        NetworkPool::new(cloud, name, cidr.parse().unwrap(), PoolKind::ExternalNetwork)
    }

    fn reconcile(pools: Vec<NetworkPool>, allocations: Vec<AddressAllocation>) -> UtilizationReport {
        let reconciler = Reconciler::new(
            PoolRegistry::from_pools(pools),
            AddressMath::new(GatewayPolicy::FirstHost),
            100,
        );
        let collection = Collection::from_allocations(reconciler.registry(), allocations);
        reconciler.report(&collection)
    }

    fn shared_pair() -> Vec<NetworkPool> {
        vec![
            pool("X", "87.255.215.0/24", "87.255.215.0/24").shared_with(["Y"]),
            pool("Y", "87.255.215.0/24", "87.255.215.0/24"),
        ]
    }

    /// Same address given to two organizations in two pools of one cloud
    #[test]
    fn test_duplicate_in_cloud_scenario() {
        let report = reconcile(
            vec![pool("X", "P", "10.0.0.0/24"), pool("X", "Q", "10.0.0.0/24")],
            vec![
                AddressAllocation::new(ip("10.0.0.5"), "X", "P", "A"),
                AddressAllocation::new(ip("10.0.0.5"), "X", "Q", "B"),
            ],
        );

        let conflicts = &report.conflicts[&ip("10.0.0.5")];
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::DuplicateInCloud);
        assert_eq!(conflicts[0].clouds, vec!["X"]);
        assert_eq!(
            conflicts[0].pools,
            BTreeSet::from(["P".to_string(), "Q".to_string()])
        );
    }

    /// A shared pool reports the other cloud's allocation as used, with no conflict
    #[test]
    fn test_shared_pool_sees_peer_allocation() {
        let report = reconcile(
            shared_pair(),
            vec![AddressAllocation::new(ip("87.255.215.10"), "Y", "87.255.215.0/24", "C")],
        );

        let x = report.pool("X", "87.255.215.0/24").unwrap();
        assert_eq!(x.used, 1);
        assert!(x.used_addresses.is_empty());
        assert!(!x.free_sample.contains(&ip("87.255.215.10")));
        assert!(report.conflicts.is_empty());
    }

    /// Both clouds claim the shared address
    #[test]
    fn test_cross_cloud_conflict_scenario() {
        let report = reconcile(
            shared_pair(),
            vec![
                AddressAllocation::new(ip("87.255.215.10"), "Y", "87.255.215.0/24", "C"),
                AddressAllocation::new(ip("87.255.215.10"), "X", "87.255.215.0/24", "D"),
            ],
        );

        let conflicts = &report.conflicts[&ip("87.255.215.10")];
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::CrossCloudConflict);
        assert_eq!(conflicts[0].clouds, vec!["X", "Y"]);
        assert_eq!(
            conflicts[0].organizations,
            BTreeSet::from(["C".to_string(), "D".to_string()])
        );
        assert!(report.pool("X", "87.255.215.0/24").unwrap().conflicts.is_some());
        assert!(report.pool("Y", "87.255.215.0/24").unwrap().conflicts.is_some());
    }

    #[test]
    fn test_empty_slash_30() {
        let report = reconcile(vec![pool("X", "tiny", "10.0.0.0/30")], Vec::new());
        let tiny = report.pool("X", "tiny").unwrap();
        assert_eq!((tiny.total, tiny.used, tiny.free), (1, 0, 1));
    }

    /// Identical networks with no sharing declaration still form one group
    #[test]
    fn test_identical_cidrs_grouped() {
        let report = reconcile(
            vec![pool("A", "lan", "192.168.1.0/24"), pool("B", "lan", "192.168.1.0/24")],
            Vec::new(),
        );
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].members, vec!["A/lan", "B/lan"]);
        assert_eq!(report.total, 253);
    }

    /// Nested networks in one group count their distinct addresses once
    #[test]
    fn test_nested_group_global_total_is_distinct() {
        let math = AddressMath::new(GatewayPolicy::FirstHost);
        let pools = vec![
            pool("vcd", "176.98.235.0/24", "176.98.235.0/24"),
            pool("vcd02", "ExtNet-176.98.235.0m25-INTERNET", "176.98.235.0/25"),
            pool("vcd03", "upper", "176.98.235.128/26"),
        ];
        let distinct: BTreeSet<Ipv4Addr> = pools.iter().flat_map(|p| math.usable(&p.cidr)).collect();

        let report = reconcile(
            pools,
            vec![
                AddressAllocation::new(ip("176.98.235.20"), "vcd02", "ExtNet-176.98.235.0m25-INTERNET", "A"),
                AddressAllocation::new(ip("176.98.235.130"), "vcd03", "upper", "B"),
            ],
        );

        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.total, distinct.len());
        assert_eq!(report.used, 2);
        let member_sum: usize = report.clouds.iter().map(|c| c.total).sum();
        assert!(member_sum > report.total);
    }

    #[test]
    fn test_totals_invariant_for_every_pool() {
        let report = reconcile(
            vec![
                pool("vcd", "176.98.235.0/24", "176.98.235.0/24"),
                pool("vcd02", "ExtNet-176.98.235.0m25-INTERNET", "176.98.235.0/25"),
                pool("vcd01", "Internet", "37.208.43.0/24"),
                pool("vcd01", "p2p", "10.255.0.0/31"),
            ],
            vec![
                AddressAllocation::new(ip("176.98.235.1"), "vcd", "176.98.235.0/24", "gw"),
                AddressAllocation::new(ip("176.98.235.50"), "vcd", "176.98.235.0/24", "A"),
                AddressAllocation::new(ip("37.208.43.7"), "vcd01", "Internet", "B"),
                AddressAllocation::new(ip("10.255.0.1"), "vcd01", "p2p", "C"),
            ],
        );

        for cloud in &report.clouds {
            assert_eq!(cloud.total, cloud.used + cloud.free, "{}", cloud.cloud);
            for pool in &cloud.pools {
                assert_eq!(pool.total, pool.used + pool.free, "{}/{}", pool.cloud, pool.name);
            }
        }
        assert_eq!(report.total, report.used + report.free);
    }

    #[test]
    fn test_report_independent_of_allocation_order() {
        let mut allocations = vec![
            AddressAllocation::new(ip("87.255.215.10"), "Y", "87.255.215.0/24", "C"),
            AddressAllocation::new(ip("87.255.215.10"), "X", "87.255.215.0/24", "D"),
            AddressAllocation::new(ip("87.255.215.11"), "X", "87.255.215.0/24", "D"),
            AddressAllocation::new(ip("87.255.215.11"), "X", "87.255.215.0/24", "E"),
            AddressAllocation::new(ip("87.255.215.200"), "Y", "87.255.215.0/24", "F"),
        ];
        let baseline = serde_json::to_string(&reconcile(shared_pair(), allocations.clone())).unwrap();

        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..5 {
            allocations.shuffle(&mut rng);
            let shuffled = serde_json::to_string(&reconcile(shared_pair(), allocations.clone())).unwrap();
            assert_eq!(shuffled, baseline);
        }
    }

    /// Full path: YAML configuration, per-cloud snapshot files, one cloud missing
    #[test]
    fn test_pipeline_from_files_with_missing_cloud() {
        let yaml = r#"
report:
  free_sample_limit: 3
clouds:
  vcd:
    pools:
      - id: "urn:vcloud:ipSpace:8d23d064"
        name: "87.255.215.0/24"
        network: "87.255.215.0/24"
        type: ipSpace
        shared_with: ["vcd02"]
      - name: "typo"
        network: "87.255.300.0/24"
        type: ipSpace
  vcd01:
    pools:
      - name: "Internet"
        network: "37.208.43.0/24"
        type: externalNetwork
  vcd02:
    pools:
      - name: "ExtNet-87.255.215.0m24-INTERNET"
        network: "87.255.215.0/24"
        type: externalNetwork
        shared_with: ["vcd"]
"#;
        let mut config_file = NamedTempFile::new().unwrap();
        write!(config_file, "{}", yaml).unwrap();
        let config: Config = load_config(config_file.path()).unwrap();

        let snapshots = TempDir::new().unwrap();
        fs::write(
            snapshots.path().join("vcd.json"),
            r#"[{"ip_address": "87.255.215.10", "org_name": "org-d", "allocation_type": "FLOATING_IP",
                 "pool_name": "87.255.215.0/24"}]"#,
        )
        .unwrap();
        fs::write(
            snapshots.path().join("vcd02.json"),
            r#"[{"ip": "87.255.215.10", "organization": "org-c", "allocation_kind": "EDGE",
                 "pool": "ExtNet-87.255.215.0m24-INTERNET", "entity": "edge-gw"}]"#,
        )
        .unwrap();

        let reconciler = Reconciler::from_config(&config);
        let report = reconciler.run(&SnapshotCollector::new(snapshots.path()), None);

        assert_eq!(report.cloud("vcd01").unwrap().status, CollectionStatus::Missing);
        assert_eq!(report.cloud("vcd").unwrap().status, CollectionStatus::Fresh);
        assert!(report.pool("vcd", "typo").is_none());

        let kinds: Vec<WarningKind> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::InvalidNetwork, WarningKind::CollectionFailure]);

        assert_eq!(report.total, 253 + 253);
        assert_eq!(report.used, 1);
        assert_eq!(report.pool("vcd", "87.255.215.0/24").unwrap().free_sample.len(), 3);

        let conflicts = &report.conflicts[&ip("87.255.215.10")];
        assert_eq!(conflicts[0].kind, ConflictKind::CrossCloudConflict);
        assert_eq!(conflicts[0].clouds, vec!["vcd", "vcd02"]);
        assert_eq!(report.find_address(ip("87.255.215.10")).len(), 2);

        // A later run where vcd02 is unreachable falls back to this report's data
        fs::remove_file(snapshots.path().join("vcd02.json")).unwrap();
        let fallback = reconciler.run(
            &SnapshotCollector::new(snapshots.path()),
            Some(&report.allocations),
        );
        assert_eq!(fallback.cloud("vcd02").unwrap().status, CollectionStatus::Stale);
        assert_eq!(fallback.conflicts, report.conflicts);
    }

    /// A misnamed pool is dropped with a warning; every other pool is reported
    #[test]
    fn test_duplicate_pool_name_degrades_report() {
        let yaml = r#"
clouds:
  vcd:
    pools:
      - name: "a"
        network: "10.0.0.0/24"
        type: ipSpace
      - name: "a"
        network: "10.0.1.0/24"
        type: ipSpace
  vcd02:
    pools:
      - name: "Internet"
        network: "37.208.43.0/24"
        type: externalNetwork
"#;
        let mut config_file = NamedTempFile::new().unwrap();
        write!(config_file, "{}", yaml).unwrap();
        let config = load_config(config_file.path()).unwrap();

        let reconciler = Reconciler::from_config(&config);
        let collection = Collection::from_allocations(
            reconciler.registry(),
            vec![
                AddressAllocation::new(ip("10.0.0.5"), "vcd", "a", "org"),
                AddressAllocation::new(ip("37.208.43.7"), "vcd02", "Internet", "org"),
            ],
        );
        let report = reconciler.report(&collection);

        assert_eq!(report.cloud("vcd").unwrap().total_pools, 1);
        assert_eq!(report.pool("vcd", "a").unwrap().network.to_string(), "10.0.0.0/24");
        assert_eq!(report.pool("vcd02", "Internet").unwrap().used, 1);
        assert_eq!(report.total, 253 * 2);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::InvalidPool);
        assert_eq!(report.warnings[0].pool.as_deref(), Some("a"));
    }
}
