//! 派生关系演示程序
//!
//! 展示在内存中构建元数据文档、查询患者版本树并比较两个分割版本

use chrono::{Duration, TimeZone, Utc};
use mivc_core::MetadataDocument;
use mivc_provenance::{
    graph::{self, NewDerivative, NewOriginal},
    ComparisonEngine, MemoryVolumeLoader, VoxelVolume,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🩻 MIVC 派生关系演示\n");

    let mut doc = MetadataDocument::new();
    let registered_at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();

    // 1. 注册原始影像
    let original_id = graph::record_original(
        &mut doc,
        NewOriginal {
            file_path: "scans/p001_ct.dcm".to_string(),
            patient_id: "P001".to_string(),
            study_info: "腹部CT平扫".to_string(),
            timestamp: registered_at,
            content_hash: "3f786850e387550fdab836ed7e6dc881de23001b".to_string(),
        },
    )?;
    println!("✅ 原始影像已注册: {}", original_id);

    // 2. 注册两个派生分割结果
    let liver_id = graph::record_derivative(
        &mut doc,
        &original_id,
        NewDerivative {
            file_path: "segs/p001_liver.dcm".to_string(),
            description: "肝脏分割".to_string(),
            method: "unet".to_string(),
            timestamp: registered_at + Duration::minutes(12),
            content_hash: "89e6c98d92887913cadf06b2adb97f26cde4849b".to_string(),
        },
    )?;
    let liver_rev_id = graph::record_derivative(
        &mut doc,
        &original_id,
        NewDerivative {
            file_path: "segs/p001_liver_rev.dcm".to_string(),
            description: "肝脏分割(人工修订)".to_string(),
            method: "manual".to_string(),
            timestamp: registered_at + Duration::minutes(45),
            content_hash: "2b66fd261ee5c6cfc8de7fa466bab600bcfe4f69".to_string(),
        },
    )?;
    println!("✅ 派生版本已注册: {} / {}", liver_id, liver_rev_id);

    // 3. 查询患者版本树
    println!("\n📋 患者 P001 的版本树:");
    for node in graph::patient_tree(&doc, "P001") {
        println!("  原始影像 {} ({})", node.original.id, node.original.study_info);
        for version in &node.derivatives {
            println!("    - {}: {}", version.id, version.description);
        }
    }

    // 4. 比较两个版本
    let mut loader = MemoryVolumeLoader::new();
    loader.insert(
        "segs/p001_liver.dcm",
        VoxelVolume::new(2, 2, 2, vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0]),
    );
    loader.insert(
        "segs/p001_liver_rev.dcm",
        VoxelVolume::new(2, 2, 2, vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
    );
    let engine = ComparisonEngine::new(Box::new(loader));

    let report = engine.compare(&doc, &liver_id, &liver_rev_id).await?;
    println!("\n📊 {}", report.render());

    Ok(())
}
