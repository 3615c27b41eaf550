use forge_core::outcome::IdeaAnalysis;
use forge_core::request::{
    AnalysisRequest, AnalysisType, GenerationRequest, OptimizationRequest, PackageType,
    PublishRequest, TemplateRequest, UltraThinkRequest, Validate, ValidationError,
};
use serde_json::json;

fn generation(body: serde_json::Value) -> GenerationRequest {
    serde_json::from_value(body).unwrap()
}

#[test]
fn minimal_generation_request_applies_defaults() {
    let req = generation(json!({
        "config": {
            "packageName": "demo-lib",
            "description": "A demo library",
            "packageType": "library",
            "qualityLevel": "good"
        }
    }));

    assert!(req.validate().is_ok());
    assert_eq!(req.config.version, "1.0.0");
    assert_eq!(req.config.license, "MIT");
    assert_eq!(req.config.package_type, PackageType::Library);
    assert!(req.config.enable_testing);
    assert!(req.config.enable_typescript);
    assert!(!req.config.enable_docker);
    assert!(req.ai_config.is_none());
}

#[test]
fn wire_names_for_feature_flags() {
    let req = generation(json!({
        "config": {
            "packageName": "demo-lib",
            "description": "d",
            "packageType": "cli-tool",
            "qualityLevel": "enterprise",
            "enableTypeScript": false,
            "enableCICD": true,
            "enableOpenAIAgents": true
        }
    }));
    assert!(!req.config.enable_typescript);
    assert!(req.config.enable_cicd);
    assert!(req.config.enable_openai_agents);
}

#[test]
fn rejects_unknown_package_type() {
    let res = serde_json::from_value::<GenerationRequest>(json!({
        "config": {
            "packageName": "demo-lib",
            "description": "d",
            "packageType": "spaceship",
            "qualityLevel": "good"
        }
    }));
    assert!(res.is_err());
}

#[test]
fn rejects_bad_package_names_and_versions() {
    let mut req = generation(json!({
        "config": {
            "packageName": "demo lib",
            "description": "d",
            "packageType": "library",
            "qualityLevel": "good"
        }
    }));
    assert!(matches!(
        req.validate(),
        Err(ValidationError::Invalid { field: "packageName", .. })
    ));

    req.config.package_name = "x".repeat(215);
    assert!(matches!(
        req.validate(),
        Err(ValidationError::Length { field: "packageName", .. })
    ));

    req.config.package_name = "demo-lib".into();
    req.config.version = "one".into();
    assert!(matches!(
        req.validate(),
        Err(ValidationError::Invalid { field: "version", .. })
    ));
}

#[test]
fn dotted_and_scoped_names_are_valid() {
    let mut req = generation(json!({
        "config": {
            "packageName": "socket.io",
            "description": "d",
            "packageType": "library",
            "qualityLevel": "good"
        }
    }));
    assert!(req.validate().is_ok());

    req.config.package_name = "@babel/plugin.x".into();
    assert!(req.validate().is_ok());

    req.config.package_name = "...".into();
    assert!(matches!(
        req.validate(),
        Err(ValidationError::Invalid { field: "packageName", .. })
    ));
}

#[test]
fn idea_and_ai_config_are_checked() {
    let mut req = generation(json!({
        "config": {
            "packageName": "demo-lib",
            "description": "d",
            "packageType": "library",
            "qualityLevel": "good"
        },
        "idea": "short",
        "aiConfig": {}
    }));
    assert!(matches!(
        req.validate(),
        Err(ValidationError::Length { field: "idea", .. })
    ));

    req.idea = Some("a date formatting helper library".into());
    assert!(req.validate().is_ok());

    if let Some(ai) = req.ai_config.as_mut() {
        ai.temperature = 3.5;
    }
    assert!(matches!(req.validate(), Err(ValidationError::Range { .. })));
}

#[test]
fn ultrathink_preset_forces_reasoning_settings() {
    let ai = forge_core::request::AiConfig::default().ultrathink();
    assert!(ai.enable_ultrathink);
    assert!(ai.enable_self_improvement);
    assert_eq!(ai.max_iterations, 5);
    assert!(ai.validate().is_ok());
}

#[test]
fn analysis_defaults() {
    let req: AnalysisRequest = serde_json::from_value(json!({"packagePath": "/tmp/pkg"})).unwrap();
    assert_eq!(req.analysis_type, AnalysisType::Comprehensive);
    assert!(req.include_recommendations);
    assert!(req.validate().is_ok());

    let blank = AnalysisRequest {
        package_path: "  ".into(),
        ..req
    };
    assert!(blank.validate().is_err());
}

#[test]
fn publish_tag_must_be_a_single_word() {
    let mut req: PublishRequest = serde_json::from_value(json!({"packagePath": "/tmp/pkg"})).unwrap();
    assert_eq!(req.registry, "npm");
    assert_eq!(req.tag, "latest");
    assert!(req.is_public);
    assert!(!req.dry_run);
    assert!(req.validate().is_ok());

    req.tag = "next release".into();
    assert!(req.validate().is_err());
}

#[test]
fn optimization_requires_known_type() {
    let ok: OptimizationRequest = serde_json::from_value(json!({
        "packagePath": "/tmp/pkg",
        "optimizationType": "bundle"
    }))
    .unwrap();
    assert_eq!(ok.aggressiveness.as_str(), "moderate");

    let bad = serde_json::from_value::<OptimizationRequest>(json!({
        "packagePath": "/tmp/pkg",
        "optimizationType": "everything"
    }));
    assert!(bad.is_err());
}

#[test]
fn template_config_must_be_object() {
    let req = TemplateRequest {
        config: json!(["not", "an", "object"]),
        output_dir: "/tmp/out".into(),
    };
    assert!(req.validate().is_err());

    let req = TemplateRequest {
        config: json!({"name": "x"}),
        output_dir: "/tmp/out".into(),
    };
    assert!(req.validate().is_ok());
}

#[test]
fn ultrathink_bounds() {
    let mut req: UltraThinkRequest =
        serde_json::from_value(json!({"idea": "a cli that tidies package.json files"})).unwrap();
    assert_eq!(req.depth, 3);
    assert!((req.creativity - 0.7).abs() < f64::EPSILON);
    assert!(req.validate().is_ok());

    req.creativity = 1.5;
    assert!(req.validate().is_err());

    req.creativity = 0.5;
    req.depth = 6;
    assert!(req.validate().is_err());
}

#[test]
fn idea_analysis_enriches_config() {
    let mut req = generation(json!({
        "config": {
            "packageName": "date-kit",
            "description": "Dates",
            "packageType": "library",
            "qualityLevel": "good",
            "dependencies": {"dayjs": "^1.11.0"},
            "devDependencies": {"vitest": "^1.0.0"}
        }
    }));
    let analysis = IdeaAnalysis {
        description: Some("ignored, request has one".into()),
        suggested_type: Some("utility".into()),
        recommended_features: vec!["tree-shaking".into()],
        recommended_dependencies: vec!["dayjs".into(), "zod".into(), "vitest".into()],
        ..IdeaAnalysis::default()
    };
    req.config.apply_analysis(&analysis);

    assert_eq!(req.config.description, "Dates");
    assert_eq!(req.config.package_type, PackageType::Library);
    assert_eq!(req.config.dependencies.get("dayjs").map(String::as_str), Some("^1.11.0"));
    assert_eq!(req.config.dependencies.get("zod").map(String::as_str), Some("latest"));
    assert!(!req.config.dependencies.contains_key("vitest"));
    assert_eq!(
        req.config.customizations,
        Some(json!({"recommendedFeatures": ["tree-shaking"], "suggestedType": "utility"}))
    );
}

#[test]
fn empty_analysis_leaves_config_alone() {
    let mut req = generation(json!({
        "config": {
            "packageName": "date-kit",
            "description": "Dates",
            "packageType": "library",
            "qualityLevel": "good"
        }
    }));
    let before = req.config.clone();
    req.config.apply_analysis(&IdeaAnalysis::default());
    assert_eq!(req.config, before);
}
