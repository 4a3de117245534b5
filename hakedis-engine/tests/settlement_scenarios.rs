use hakedis_engine::CalculationAnomaly;
use hakedis_engine::report::ReportRowKind;
use hakedis_engine::repository::{
    CatalogRepository, InMemoryCatalog, InMemorySettlementRepository, SettlementRepository,
};
use hakedis_engine::{
    Confirmation, EngineConfig, FinalizeOutcome, SettlementDocument, SettlementService,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::ErrorCode;
use shared::models::{
    AdditionalIncomeDetail, IncomeGroup, IncomeRecord, ManualOverrides, OverrideField,
    RevenueModel, SettlementCreate, SettlementPeriod, SettlementStatus, SettlementUpdate,
    SplitPolicy, TenorRate, UsageRegion, VolumeMap,
};
use std::sync::Arc;

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::with_data(
        [
            IncomeGroup::new(10, "Retail POS", vec![1, 2, 3, 4]),
            IncomeGroup::new(20, "Treasury", vec![5]),
        ],
        [
            IncomeRecord::new(1, "Bank A", RevenueModel::SharedMargin)
                .with_rate(TenorRate::shared_margin("D+7", dec!(1.0), dec!(1.8)))
                .with_rate(TenorRate::shared_margin("D+1", dec!(2.0), dec!(1.5)))
                .with_split(SplitPolicy::new(dec!(60), dec!(40))),
            IncomeRecord::new(2, "Terminal rental", RevenueModel::FixedFee)
                .with_additional_income(AdditionalIncomeDetail::new(dec!(70), dec!(30))),
            IncomeRecord::new(3, "Bank C", RevenueModel::FixedFee)
                .with_rate(TenorRate::fixed_fee("D+0", dec!(0.5)))
                .with_region(UsageRegion::ForeignUse),
            IncomeRecord::new(4, "Bank D", RevenueModel::FixedFee)
                .with_rate(TenorRate::fixed_fee("D+0", dec!(0.25))),
            IncomeRecord::new(5, "Bond desk", RevenueModel::TreasuryYield)
                .with_rate(TenorRate::treasury_yield("D+30", dec!(100), dec!(2)))
                .with_split(SplitPolicy::new(dec!(80), dec!(20))),
        ],
    )
}

fn service() -> SettlementService {
    SettlementService::new(
        Arc::new(catalog()),
        Arc::new(InMemorySettlementRepository::new()),
        EngineConfig::default(),
    )
}

fn march() -> SettlementPeriod {
    SettlementPeriod::new(2024, 3).unwrap()
}

fn retail_volumes() -> VolumeMap {
    VolumeMap::new()
        .with_primary(1, "D+7", dec!(1000000))
        .with_primary(1, "D+1", dec!(200000))
        .with_primary(3, "D+0", dec!(2000000))
        .with_additional(2, dec!(50000))
}

#[test]
fn test_full_retail_month() {
    let service = service();
    let calc = service
        .calculate(10, Some(march()), &retail_volumes(), &ManualOverrides::default(), false)
        .unwrap();

    // Bank D has an active tenor with no volume: still a row, all zero
    assert_eq!(calc.primary_rows.len(), 4);
    let bank_d = calc.primary_rows.iter().find(|r| r.record_id == 4).unwrap();
    assert_eq!(bank_d.volume, Decimal::ZERO);
    assert_eq!(bank_d.margin, Decimal::ZERO);

    let totals = &calc.totals;
    assert_eq!(totals.primary.volume.effective(), dec!(3200000));
    assert_eq!(totals.primary.margin, dec!(8000) - dec!(1000) + dec!(10000));
    assert_eq!(totals.primary.platform_share.effective(), dec!(3200) + dec!(5000));
    assert_eq!(totals.primary.excluded_count, 1);

    assert_eq!(totals.grand.volume.effective(), dec!(3250000));
    assert_eq!(totals.grand.platform_share.effective(), dec!(8200) + dec!(15000));
    assert_eq!(totals.grand.margin, totals.primary.margin);

    let foreign = calc.breakdown.by_region[&UsageRegion::ForeignUse];
    assert_eq!(foreign.volume, dec!(2000000));
}

#[test]
fn test_negative_policy_toggle() {
    let service = service();
    let excluded = service
        .calculate(10, None, &retail_volumes(), &ManualOverrides::default(), false)
        .unwrap();
    let included = service
        .calculate(10, None, &retail_volumes(), &ManualOverrides::default(), true)
        .unwrap();

    let all_rows: Decimal = included.primary_rows.iter().map(|r| r.platform_share).sum();
    assert_eq!(included.totals.primary.platform_share.computed, all_rows);
    assert_eq!(
        excluded.totals.primary.platform_share.computed - included.totals.primary.platform_share.computed,
        dec!(400)
    );
    assert_eq!(excluded.totals.primary.margin, included.totals.primary.margin);
    assert_eq!(excluded.totals.grand.volume, included.totals.grand.volume);
}

#[test]
fn test_treasury_yield_group() {
    let service = service();
    let volumes = VolumeMap::new().with_primary(5, "D+30", dec!(1000));
    let calc = service
        .calculate(20, None, &volumes, &ManualOverrides::default(), false)
        .unwrap();

    let row = &calc.primary_rows[0];
    assert_eq!(row.cost, dec!(100000));
    assert_eq!(row.revenue, dec!(100000));
    assert_eq!(row.margin, dec!(2000));
    assert_eq!(row.institution_share, dec!(1600));
    assert_eq!(row.platform_share, dec!(400));
}

#[test]
fn test_snapshot_lifecycle_with_overrides() {
    let service = service();
    let draft = service
        .create_draft(SettlementCreate {
            group_id: 10,
            period: march(),
            volume_map: retail_volumes(),
            manual_overrides: ManualOverrides::default(),
            include_negative_values: false,
            notes: String::new(),
        })
        .unwrap();

    service
        .set_override(draft.id, OverrideField::PrimaryVolumeTotal, dec!(3100000))
        .unwrap();
    service
        .update_draft(
            draft.id,
            SettlementUpdate {
                notes: Some("volume corrected by bank statement".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let report = service.export(draft.id).unwrap();
    let grand = report.rows_of(ReportRowKind::GrandTotal).next().unwrap();
    assert_eq!(grand.volume, "3150000.00 (MANUAL)");
    assert_eq!(report.header.status, SettlementStatus::Draft);

    assert_eq!(
        service.finalize(draft.id, Confirmation::Declined).unwrap(),
        FinalizeOutcome::Aborted
    );
    assert!(!service.find(draft.id).unwrap().is_finalized());

    let outcome = service
        .finalize(
            draft.id,
            Confirmation::Confirmed(vec![OverrideField::PrimaryVolumeTotal]),
        )
        .unwrap();
    assert_eq!(outcome, FinalizeOutcome::Finalized);

    let err = service
        .clear_override(draft.id, OverrideField::PrimaryVolumeTotal)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::SettlementAlreadyFinalized);

    // Edits after finalize go through a new revision
    let revision = service.revise(draft.id).unwrap();
    let revision = service
        .clear_override(revision.id, OverrideField::PrimaryVolumeTotal)
        .unwrap();
    let calc = service.recalculate(revision.id).unwrap();
    assert_eq!(calc.totals.grand.volume.effective(), dec!(3250000));
    assert!(calc.totals.manual_fields().is_empty());

    let finalized = service.find(draft.id).unwrap();
    assert_eq!(
        finalized.manual_overrides.get(OverrideField::PrimaryVolumeTotal),
        Some(dec!(3100000))
    );
}

#[test]
fn test_group_rename_keeps_snapshot_name() {
    let catalog = Arc::new(catalog());
    let store = Arc::new(InMemorySettlementRepository::new());
    let service = SettlementService::new(catalog.clone(), store.clone(), EngineConfig::default());

    let draft = service
        .create_draft(SettlementCreate {
            group_id: 20,
            period: march(),
            volume_map: VolumeMap::new(),
            manual_overrides: ManualOverrides::default(),
            include_negative_values: false,
            notes: String::new(),
        })
        .unwrap();

    let mut renamed = catalog.find_group(20).unwrap();
    renamed.name = "Treasury & Bonds".into();
    catalog.upsert_group(renamed).unwrap();

    let header = service.export(draft.id).unwrap().header;
    assert_eq!(header.group_name, "Treasury");
    assert_eq!(header.current_group_name.as_deref(), Some("Treasury & Bonds"));
    assert!(header.group_renamed);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_document_round_trip_through_json() {
    let document = SettlementDocument {
        group: IncomeGroup::new(10, "Retail POS", vec![1]),
        records: vec![
            IncomeRecord::new(1, "Bank A", RevenueModel::SharedMargin)
                .with_rate(TenorRate::shared_margin("D+7", dec!(1.0), dec!(1.8)))
                .with_split(SplitPolicy::new(dec!(60), dec!(40))),
        ],
        period: march(),
        volumes: VolumeMap::new().with_primary(1, "D+7", dec!(1000000)),
        overrides: ManualOverrides::default(),
        notes: String::new(),
        include_negative_values: None,
    };
    let json = serde_json::to_string(&document).unwrap();
    let parsed: SettlementDocument = serde_json::from_str(&json).unwrap();

    let (service, record) = SettlementService::from_document(parsed, EngineConfig::default()).unwrap();
    let csv = service.export_csv(record.id).unwrap();
    let primary = csv.lines().nth(1).unwrap();
    assert_eq!(
        primary,
        "primary,1,D+7,DOMESTIC_USE,SHARED_MARGIN,1000000.00,10000.00,18000.00,8000.00,4800.00,3200.00,"
    );
}

#[test]
fn test_csv_written_to_file() {
    let (service, record) = SettlementService::from_document(
        SettlementDocument {
            group: IncomeGroup::new(10, "Retail POS", vec![3]),
            records: vec![
                IncomeRecord::new(3, "Bank C", RevenueModel::FixedFee)
                    .with_rate(TenorRate::fixed_fee("D+0", dec!(0.5))),
            ],
            period: march(),
            volumes: VolumeMap::new().with_primary(3, "D+0", dec!(2000000)),
            overrides: ManualOverrides::default(),
            notes: String::new(),
            include_negative_values: None,
        },
        EngineConfig::default(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("march.csv");
    let report = service.export(record.id).unwrap();
    report
        .write_csv(std::fs::File::create(&path).unwrap(), b';')
        .unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("kind;record_id;tenor;region;model"));
    assert!(written
        .lines()
        .any(|line| line == "primary_total;;;;;2000000.00;0.00;10000.00;10000.00;5000.00;5000.00;"));
    assert_eq!(written.lines().count(), 5);
}

#[test]
fn test_snapshot_store_keeps_finalized_revisions() {
    let store = Arc::new(InMemorySettlementRepository::new());
    let service = SettlementService::new(Arc::new(catalog()), store.clone(), EngineConfig::default());

    let first = service
        .create_draft(SettlementCreate {
            group_id: 20,
            period: march(),
            volume_map: VolumeMap::new(),
            manual_overrides: ManualOverrides::default(),
            include_negative_values: false,
            notes: String::new(),
        })
        .unwrap();
    service.finalize(first.id, Confirmation::Unconfirmed).unwrap();
    let second = service.revise(first.id).unwrap();

    let latest = store.find_by_group_period(20, march()).unwrap().unwrap();
    assert_eq!(latest.id, second.id);
    assert_eq!(latest.revision, 2);
    assert!(store.delete(first.id).is_err());
    store.delete(second.id).unwrap();
}

fn retail_draft(service: &SettlementService) -> i64 {
    service
        .create_draft(SettlementCreate {
            group_id: 10,
            period: march(),
            volume_map: retail_volumes(),
            manual_overrides: ManualOverrides::default(),
            include_negative_values: false,
            notes: String::new(),
        })
        .unwrap()
        .id
}

#[test]
fn test_finalized_totals_ignore_later_catalog_edits() {
    let catalog = Arc::new(catalog());
    let service = SettlementService::new(
        catalog.clone(),
        Arc::new(InMemorySettlementRepository::new()),
        EngineConfig::default(),
    );
    let id = retail_draft(&service);
    service.finalize(id, Confirmation::Unconfirmed).unwrap();
    let before = service.export_csv(id).unwrap();

    let mut group = catalog.find_group(10).unwrap();
    group.is_active = false;
    group.record_ids.retain(|&record_id| record_id != 3);
    catalog.upsert_group(group).unwrap();
    catalog
        .upsert_record(
            IncomeRecord::new(1, "Bank A", RevenueModel::SharedMargin)
                .with_rate(TenorRate::shared_margin("D+7", dec!(1.0), dec!(5.0)))
                .with_split(SplitPolicy::new(dec!(10), dec!(90))),
        )
        .unwrap();

    assert_eq!(service.export_csv(id).unwrap(), before);
    let calc = service.recalculate(id).unwrap();
    assert_eq!(calc.totals.grand.platform_share.effective(), dec!(23200));
    assert_eq!(calc.totals.grand.volume.effective(), dec!(3250000));

    // A new revision reads the catalog as it is now
    let revision = service.revise(id).unwrap();
    let calc = service.recalculate(revision.id).unwrap();
    assert_eq!(calc.totals.grand.platform_share.effective(), Decimal::ZERO);
    assert!(matches!(
        calc.anomalies[0],
        CalculationAnomaly::GroupNotEligible { .. }
    ));
}

#[test]
fn test_superseded_revision_cannot_be_revised() {
    let service = service();
    let first = retail_draft(&service);
    service.finalize(first, Confirmation::Unconfirmed).unwrap();

    let second = service.revise(first).unwrap();
    let err = service.revise(first).unwrap_err();
    assert_eq!(err.code, ErrorCode::SettlementSuperseded);

    service.finalize(second.id, Confirmation::Unconfirmed).unwrap();
    let err = service.revise(first).unwrap_err();
    assert_eq!(err.code, ErrorCode::SettlementSuperseded);

    let third = service.revise(second.id).unwrap();
    assert_eq!(third.revision, 3);
    assert_eq!(third.supersedes, Some(second.id));

    let revisions: Vec<u32> = service.list(Some(10)).unwrap().iter().map(|r| r.revision).collect();
    assert_eq!(revisions, vec![1, 2, 3]);
}

#[test]
fn test_oversized_document_volume_settles_with_anomaly() {
    let document: SettlementDocument = serde_json::from_value(serde_json::json!({
        "group": {"id": 20, "name": "Treasury", "record_ids": [5, 6]},
        "records": [
            {
                "id": 5,
                "name": "Bond desk",
                "revenue_model": "TREASURY_YIELD",
                "tenor_rates": [{"tenor": "D+30", "unit_amount": "100", "platform_yield_pct": "2"}],
                "split_policy": {"institution_pct": "80", "platform_pct": "20"}
            },
            {
                "id": 6,
                "name": "Bank C",
                "revenue_model": "FIXED_FEE",
                "tenor_rates": [{"tenor": "D+0", "fixed_pct": "0.5"}]
            }
        ],
        "period": "2024-03",
        "volumes": [
            {"record_id": 5, "tenor": "D+30", "volume": "1000000000000000000000000000"},
            {"record_id": 6, "tenor": "D+0", "volume": "2000000"}
        ]
    }))
    .unwrap();

    let (service, record) =
        SettlementService::from_document(document, EngineConfig::default()).unwrap();
    let calc = service.recalculate(record.id).unwrap();
    assert!(calc.anomalies.iter().any(|a| matches!(
        a,
        CalculationAnomaly::AmountOutOfRange { record_id: 5, .. }
    )));
    assert_eq!(calc.totals.grand.platform_share.effective(), dec!(5000));

    let csv = service.export_csv(record.id).unwrap();
    assert!(csv.lines().last().unwrap().starts_with("grand_total"));
}
