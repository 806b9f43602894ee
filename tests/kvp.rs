// Key/value GetRecords and GetCapabilities normalization: defaults, fault
// codes and locators, namespace handling, and constraint parsing.
mod support;

use anyhow::Result;
use csw_query::filter::ComparisonOp;
use csw_query::namespace::{CSW_NAMESPACE, DC_NAMESPACE};
use csw_query::request::SortOrder;
use csw_query::{
    ConstraintLanguage, ElementSet, Expression, FaultCode, KvpMap, Literal, Predicate,
    QualifiedName, Request, ResultType,
};
use support::{get_records_params, read_params, search_from_params};

fn dc(local: &str) -> QualifiedName {
    QualifiedName::new(DC_NAMESPACE, local)
}

fn fault(extra: &[(&str, &str)]) -> (FaultCode, Option<String>) {
    match read_params(&get_records_params(extra)) {
        Ok(request) => panic!("expected a fault, got {request:?}"),
        Err(err) => (err.code(), err.locator().map(str::to_string)),
    }
}

// Ensures the minimal request picks up every documented default.
#[test]
fn minimal_get_records_defaults() -> Result<()> {
    let search = search_from_params(&[])?;
    assert_eq!(search.service, "CSW");
    assert_eq!(search.version, "2.0.2");
    assert!(search.request_id.is_none());

    let query = search.query;
    assert_eq!(query.type_names, vec![QualifiedName::new(CSW_NAMESPACE, "Record")]);
    assert_eq!(query.element_set, Some(ElementSet::Summary));
    assert!(query.element_names.is_none());
    assert!(query.constraint.is_none());
    assert!(query.sort_by.is_empty());
    assert_eq!(query.result_type, ResultType::Hits);
    assert_eq!(query.start_position, 1);
    assert_eq!(query.max_records, 10);
    assert_eq!(query.output_format, "application/xml");
    assert_eq!(query.output_schema, CSW_NAMESPACE);
    assert!(query.distributed_search.is_none());
    assert!(query.response_handler.is_none());
    Ok(())
}

// Ensures a CQL constraint is parsed into a predicate and its text retained.
#[test]
fn cql_constraint_is_parsed() -> Result<()> {
    let search = search_from_params(&[
        ("constraintLanguage", "CQL_TEXT"),
        ("constraint", "dc:title like '%ipsum%' and modified >= '2005-01-01'"),
        ("resultType", "results"),
    ])?;
    let constraint = search.query.constraint.expect("constraint");
    assert_eq!(constraint.language, ConstraintLanguage::CqlText);
    assert_eq!(constraint.version, "1.0.0");
    assert_eq!(
        constraint.text.as_deref(),
        Some("dc:title like '%ipsum%' and modified >= '2005-01-01'")
    );

    let Predicate::And(parts) = constraint.predicate else {
        panic!("expected a conjunction, got {:?}", constraint.predicate);
    };
    assert_eq!(parts.len(), 2);
    match &parts[0] {
        Predicate::Like {
            expression: Expression::Property(property),
            pattern,
            match_case,
        } => {
            assert_eq!(property.name, dc("title"));
            assert_eq!(property.path, vec![dc("value")]);
            assert_eq!(pattern.sql(), "%ipsum%");
            assert!(*match_case);
        }
        other => panic!("unexpected first operand {other:?}"),
    }
    match &parts[1] {
        Predicate::Comparison {
            op: ComparisonOp::GreaterOrEqual,
            right: Expression::Literal(Literal::String(value)),
            ..
        } => assert_eq!(value, "2005-01-01"),
        other => panic!("unexpected second operand {other:?}"),
    }
    Ok(())
}

// Ensures an absent constraint language defaults to CQL.
#[test]
fn constraint_language_defaults_to_cql() -> Result<()> {
    let search = search_from_params(&[("constraint", "title = 'x'")])?;
    let constraint = search.query.constraint.expect("constraint");
    assert_eq!(constraint.language, ConstraintLanguage::CqlText);
    Ok(())
}

// Ensures a FILTER constraint passed as a parameter value is decoded and
// interpreted like an embedded Filter element.
#[test]
fn filter_constraint_from_parameter() -> Result<()> {
    let filter = r#"<ogc:Filter xmlns:ogc="http://www.opengis.net/ogc"><ogc:PropertyIsEqualTo><ogc:PropertyName>dc:type</ogc:PropertyName><ogc:Literal>http://purl.org/dc/dcmitype/Dataset</ogc:Literal></ogc:PropertyIsEqualTo></ogc:Filter>"#;
    let search = search_from_params(&[
        ("constraintLanguage", "FILTER"),
        ("constraint_language_version", "1.1.0"),
        ("constraint", filter),
    ])?;
    let constraint = search.query.constraint.expect("constraint");
    assert_eq!(constraint.language, ConstraintLanguage::Filter);
    assert!(constraint.text.is_none());
    match constraint.predicate {
        Predicate::Comparison {
            op: ComparisonOp::Equal,
            left: Expression::Property(property),
            match_case: true,
            ..
        } => assert_eq!(property.name, dc("type")),
        other => panic!("unexpected predicate {other:?}"),
    }
    Ok(())
}

// Ensures CQL syntax faults carry the constraint locator and the offending
// offset.
#[test]
fn cql_syntax_error_reports_offset() {
    let err = read_params(&get_records_params(&[("constraint", "title lik '%x%'")]))
        .expect_err("syntax error");
    assert_eq!(err.code(), FaultCode::ConstraintSyntax);
    assert_eq!(err.locator(), Some("constraint"));
    let message = err.to_string();
    assert!(message.contains("offset 6"), "message was {message}");
    assert!(message.contains("lik"), "message was {message}");
}

// Ensures a language without a body is reported as a missing constraint.
#[test]
fn constraint_language_without_text_is_missing() {
    assert_eq!(
        fault(&[("constraintLanguage", "CQL_TEXT")]),
        (FaultCode::MissingParameterValue, Some("constraint".to_string()))
    );
}

// Ensures the envelope is checked before anything else.
#[test]
fn envelope_faults() {
    let params = KvpMap::from_pairs([("request", "GetRecords"), ("version", "2.0.2")]);
    let err = read_params(&params).expect_err("missing service");
    assert_eq!(err.code(), FaultCode::MissingParameterValue);
    assert_eq!(err.locator(), Some("service"));

    let params = KvpMap::from_pairs([("service", "WMS"), ("request", "GetRecords")]);
    let err = read_params(&params).expect_err("wrong service");
    assert_eq!(err.code(), FaultCode::InvalidParameterValue);
    assert_eq!(err.locator(), Some("service"));

    let params = KvpMap::from_pairs([("service", "CSW"), ("request", "Harvest")]);
    let err = read_params(&params).expect_err("unsupported operation");
    assert_eq!(err.code(), FaultCode::OperationNotSupported);

    let params = KvpMap::from_pairs([("service", "CSW")]);
    let err = read_params(&params).expect_err("missing request");
    assert_eq!(err.locator(), Some("request"));
}

// Ensures version and type name faults name the failing parameter.
#[test]
fn version_and_type_name_faults() {
    assert_eq!(
        fault(&[("version", "3.0.0")]),
        (FaultCode::InvalidParameterValue, Some("version".to_string()))
    );

    let params = KvpMap::from_pairs([
        ("service", "CSW"),
        ("version", "2.0.2"),
        ("request", "GetRecords"),
    ]);
    let err = read_params(&params).expect_err("missing typeNames");
    assert_eq!(err.code(), FaultCode::MissingParameterValue);
    assert_eq!(err.locator(), Some("typeNames"));

    let params = KvpMap::from_pairs([
        ("service", "CSW"),
        ("version", "2.0.2"),
        ("request", "GetRecords"),
        ("typeNames", "rim:RegistryPackage"),
    ]);
    let err = read_params(&params).expect_err("unbound prefix");
    assert_eq!(err.code(), FaultCode::UnresolvedPrefix);
    assert_eq!(err.locator(), Some("typeNames"));
}

// Ensures the namespace parameter binds prefixes used by other parameters.
#[test]
fn namespace_parameter_binds_prefixes() -> Result<()> {
    let params = KvpMap::from_pairs([
        ("service", "CSW"),
        ("version", "2.0.2"),
        ("request", "GetRecords"),
        (
            "namespace",
            "xmlns(rim=urn:oasis:names:tc:ebxml-regrep:xsd:rim:3.0),xmlns(x=http://example.com/ns)",
        ),
        ("typeNames", "rim:RegistryPackage,csw:Record"),
        ("elementName", "x:extent"),
    ]);
    let Request::GetRecords(search) = read_params(&params)? else {
        panic!("expected GetRecords");
    };
    assert_eq!(
        search.query.type_names,
        vec![
            QualifiedName::new("urn:oasis:names:tc:ebxml-regrep:xsd:rim:3.0", "RegistryPackage"),
            QualifiedName::new(CSW_NAMESPACE, "Record"),
        ]
    );
    assert_eq!(
        search.query.element_names,
        Some(vec![QualifiedName::new("http://example.com/ns", "extent")])
    );

    let err = read_params(&get_records_params(&[("namespace", "xmlns(rim=)")]))
        .expect_err("malformed declaration");
    assert_eq!(err.code(), FaultCode::MalformedNamespaceDeclaration);
    Ok(())
}

// Ensures an unusable version is reported ahead of a malformed namespace
// parameter.
#[test]
fn version_fault_precedes_namespace_fault() {
    assert_eq!(
        fault(&[("version", "1.0.0"), ("namespace", "xmlns(rim=)")]),
        (FaultCode::InvalidParameterValue, Some("version".to_string()))
    );

    let params = KvpMap::from_pairs([
        ("service", "CSW"),
        ("request", "GetRecords"),
        ("namespace", "xmlns(rim=)"),
        ("typeNames", "csw:Record"),
    ]);
    let err = read_params(&params).expect_err("missing version");
    assert_eq!(err.code(), FaultCode::MissingParameterValue);
    assert_eq!(err.locator(), Some("version"));
}

// Ensures element names and sort keys resolve through the record schema.
#[test]
fn element_names_and_sort_keys() -> Result<()> {
    let search = search_from_params(&[
        ("elementName", "title,dc:identifier,title"),
        ("sortBy", "modified:D,dc:title"),
    ])?;
    assert_eq!(
        search.query.element_names,
        Some(vec![dc("title"), dc("identifier")])
    );
    assert_eq!(search.query.element_set, None);
    let sort = &search.query.sort_by;
    assert_eq!(sort.len(), 2);
    assert_eq!(sort[0].property.name.local, "modified");
    assert_eq!(sort[0].order, SortOrder::Descending);
    assert_eq!(sort[1].property.name, dc("title"));
    assert_eq!(sort[1].order, SortOrder::Ascending);

    assert_eq!(
        fault(&[("sortBy", "dc:title:X")]),
        (FaultCode::InvalidParameterValue, Some("sortBy".to_string()))
    );
    Ok(())
}

// Ensures window and result parameters are validated.
#[test]
fn window_and_result_faults() {
    for (extra, locator) in [
        (("startPosition", "0"), "startPosition"),
        (("startPosition", "first"), "startPosition"),
        (("maxRecords", "-1"), "maxRecords"),
        (("resultType", "everything"), "resultType"),
        (("elementSetName", "tiny"), "elementSetName"),
        (("outputSchema", "http://www.isotc211.org/2005/gmd"), "outputSchema"),
        (("outputFormat", "text/html"), "outputFormat"),
        (("responseHandler", "not a uri"), "responseHandler"),
    ] {
        let (code, found) = fault(&[extra]);
        assert_eq!(code, FaultCode::InvalidParameterValue, "{extra:?}");
        assert_eq!(found.as_deref(), Some(locator), "{extra:?}");
    }
}

// Ensures the distributed search flag picks up the configured hop count.
#[test]
fn distributed_search_hop_count() -> Result<()> {
    let search = search_from_params(&[("distributedSearch", "TRUE")])?;
    assert_eq!(search.query.distributed_search.map(|d| d.hop_count), Some(2));

    let search = search_from_params(&[("distributedSearch", "true"), ("hopCount", "5")])?;
    assert_eq!(search.query.distributed_search.map(|d| d.hop_count), Some(5));

    let search = search_from_params(&[("distributedSearch", "false"), ("hopCount", "5")])?;
    assert!(search.query.distributed_search.is_none());

    // The hop count is validated even when it goes unused.
    for extra in [
        &[("hopCount", "abc")][..],
        &[("distributedSearch", "false"), ("hopCount", "-1")][..],
    ] {
        assert_eq!(
            fault(extra),
            (FaultCode::InvalidParameterValue, Some("hopCount".to_string())),
            "{extra:?}"
        );
    }
    Ok(())
}

// Ensures a constraint nested past the supported depth is a syntax fault
// rather than a crash.
#[test]
fn deeply_nested_constraint_is_rejected() {
    let negations = format!("{}dc:title = 'a'", "NOT ".repeat(200_000));
    let (code, locator) = fault(&[
        ("constraintLanguage", "CQL_TEXT"),
        ("constraint", &negations),
    ]);
    assert_eq!(code, FaultCode::ConstraintSyntax);
    assert_eq!(locator.as_deref(), Some("constraint"));

    let groups = format!("{}title = 'a'{}", "(".repeat(50_000), ")".repeat(50_000));
    let (code, _) = fault(&[("constraint", &groups)]);
    assert_eq!(code, FaultCode::ConstraintSyntax);

    let mut filter = String::from(r#"<ogc:Filter xmlns:ogc="http://www.opengis.net/ogc">"#);
    filter.push_str(&"<ogc:Not>".repeat(600));
    filter.push_str(
        "<ogc:PropertyIsNull><ogc:PropertyName>dc:title</ogc:PropertyName></ogc:PropertyIsNull>",
    );
    filter.push_str(&"</ogc:Not>".repeat(600));
    filter.push_str("</ogc:Filter>");
    let (code, locator) = fault(&[("constraintLanguage", "FILTER"), ("constraint", &filter)]);
    assert_eq!(code, FaultCode::ConstraintSyntax);
    assert_eq!(locator.as_deref(), Some("constraint"));
}

// Ensures the raw query string form is percent-decoded before parsing.
#[test]
fn query_string_round_trip() -> Result<()> {
    let request = support::reader()?.read_query_string(
        "service=CSW&version=2.0.2&request=GetRecords&typeNames=csw%3ARecord&constraint=AnyText%20like%20%27%25sed%25%27&resultType=results&maxRecords=3",
    )?;
    let search = support::expect_search(request)?;
    assert_eq!(search.query.max_records, 3);
    assert_eq!(search.query.result_type, ResultType::Results);
    let predicate = search.query.predicate().expect("predicate");
    assert!(matches!(
        predicate,
        Predicate::Like {
            expression: Expression::AnyText,
            ..
        }
    ));
    Ok(())
}

// Ensures GetCapabilities lists are split and kept in client order.
#[test]
fn get_capabilities_parameters() -> Result<()> {
    let params = KvpMap::from_pairs([
        ("service", "CSW"),
        ("request", "GetCapabilities"),
        ("acceptVersions", "3.0.0, 2.0.2"),
        ("sections", "OperationsMetadata,ServiceIdentification"),
        ("acceptFormats", "text/xml"),
        ("updateSequence", "42"),
    ]);
    let Request::GetCapabilities(request) = read_params(&params)? else {
        panic!("expected GetCapabilities");
    };
    assert_eq!(request.accept_versions, vec!["3.0.0", "2.0.2"]);
    assert_eq!(
        request.sections,
        vec!["OperationsMetadata", "ServiceIdentification"]
    );
    assert_eq!(request.accept_formats, vec!["text/xml"]);
    assert_eq!(request.update_sequence.as_deref(), Some("42"));
    Ok(())
}
