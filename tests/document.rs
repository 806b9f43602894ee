// Request document normalization: schema validation, scoped namespace
// resolution, and structured filter interpretation.
mod support;

use anyhow::Result;
use csw_query::filter::ComparisonOp;
use csw_query::namespace::{CSW_NAMESPACE, DC_NAMESPACE, DCT_NAMESPACE};
use csw_query::request::SortOrder;
use csw_query::{
    ConstraintLanguage, CswError, ElementSet, Expression, FaultCode, Predicate, QualifiedName,
    Request, ResultType, read_document_json,
};
use support::{CSW_XMLNS, get_records_xml, reader, search_from_xml};

fn read_fault(xml: &str) -> CswError {
    let reader = reader().expect("built-in schemas compile");
    match reader.read_xml(xml) {
        Ok(request) => panic!("expected a fault, got {request:?}"),
        Err(err) => err,
    }
}

// Ensures a complete GetRecords document maps onto the normalized query.
#[test]
fn full_get_records_document() -> Result<()> {
    let xml = get_records_xml(
        r#"resultType="results" startPosition="3" maxRecords="4" requestId="req-7""#,
        r#"<csw:DistributedSearch hopCount="3"/>
           <csw:ResponseHandler>ftp://example.com/drop</csw:ResponseHandler>
           <csw:Query typeNames="csw:Record">
             <csw:ElementSetName>brief</csw:ElementSetName>
             <csw:Constraint version="1.1.0">
               <ogc:Filter>
                 <ogc:And>
                   <ogc:PropertyIsLike wildCard="%" singleChar="_" escapeChar="\">
                     <ogc:PropertyName>dc:title</ogc:PropertyName>
                     <ogc:Literal>%ipsum%</ogc:Literal>
                   </ogc:PropertyIsLike>
                   <ogc:PropertyIsGreaterThan>
                     <ogc:PropertyName>dct:modified</ogc:PropertyName>
                     <ogc:Literal>2004-01-01</ogc:Literal>
                   </ogc:PropertyIsGreaterThan>
                 </ogc:And>
               </ogc:Filter>
             </csw:Constraint>
             <ogc:SortBy>
               <ogc:SortProperty>
                 <ogc:PropertyName>dc:title</ogc:PropertyName>
                 <ogc:SortOrder>DESC</ogc:SortOrder>
               </ogc:SortProperty>
             </ogc:SortBy>
           </csw:Query>"#,
    );
    let search = search_from_xml(&xml)?;
    assert_eq!(search.request_id.as_deref(), Some("req-7"));

    let query = &search.query;
    assert_eq!(query.type_names, vec![QualifiedName::new(CSW_NAMESPACE, "Record")]);
    assert_eq!(query.element_set, Some(ElementSet::Brief));
    assert_eq!(query.result_type, ResultType::Results);
    assert_eq!(query.start_position, 3);
    assert_eq!(query.max_records, 4);
    assert_eq!(query.distributed_search.map(|d| d.hop_count), Some(3));
    assert_eq!(query.response_handler.as_deref(), Some("ftp://example.com/drop"));

    let constraint = query.constraint.as_ref().expect("constraint");
    assert_eq!(constraint.language, ConstraintLanguage::Filter);
    assert_eq!(constraint.version, "1.1.0");
    let Predicate::And(parts) = &constraint.predicate else {
        panic!("expected a conjunction, got {:?}", constraint.predicate);
    };
    assert!(matches!(&parts[0], Predicate::Like { pattern, .. } if pattern.sql() == "%ipsum%"));
    match &parts[1] {
        Predicate::Comparison {
            op: ComparisonOp::Greater,
            left: Expression::Property(property),
            ..
        } => assert_eq!(property.name, QualifiedName::new(DCT_NAMESPACE, "modified")),
        other => panic!("unexpected operand {other:?}"),
    }

    assert_eq!(query.sort_by.len(), 1);
    assert_eq!(query.sort_by[0].order, SortOrder::Descending);
    assert_eq!(
        query.sort_by[0].property.name,
        QualifiedName::new(DC_NAMESPACE, "title")
    );
    Ok(())
}

// Ensures prefixes resolve against the declarations in scope where the
// token was written, including rebinding on nested elements.
#[test]
fn nested_declarations_scope_tokens() -> Result<()> {
    let xml = get_records_xml(
        "",
        r#"<csw:Query typeNames="x:Thing" xmlns:x="http://example.com/a">
             <csw:ElementName xmlns:x="http://example.com/b">x:extent</csw:ElementName>
             <csw:ElementName>x:extent</csw:ElementName>
           </csw:Query>"#,
    );
    let search = search_from_xml(&xml)?;
    assert_eq!(
        search.query.type_names,
        vec![QualifiedName::new("http://example.com/a", "Thing")]
    );
    assert_eq!(
        search.query.element_names,
        Some(vec![
            QualifiedName::new("http://example.com/b", "extent"),
            QualifiedName::new("http://example.com/a", "extent"),
        ])
    );
    Ok(())
}

// Ensures an undeclared prefix in a document is reported with its field.
#[test]
fn undeclared_prefix_in_document() {
    let xml = get_records_xml("", r#"<csw:Query typeNames="rim:RegistryPackage"/>"#);
    let err = read_fault(&xml);
    assert_eq!(err.code(), FaultCode::UnresolvedPrefix);
    assert_eq!(err.locator(), Some("typeNames"));
}

// Ensures a CqlText constraint in a document keeps its text.
#[test]
fn cql_text_in_document() -> Result<()> {
    let xml = get_records_xml(
        "",
        r#"<csw:Query typeNames="csw:Record">
             <csw:Constraint version="1.0.0"><csw:CqlText>title like '%ipsum%'</csw:CqlText></csw:Constraint>
           </csw:Query>"#,
    );
    let search = search_from_xml(&xml)?;
    let constraint = search.query.constraint.expect("constraint");
    assert_eq!(constraint.language, ConstraintLanguage::CqlText);
    assert_eq!(constraint.text.as_deref(), Some("title like '%ipsum%'"));
    Ok(())
}

// Ensures structural problems surface as schema validation faults with
// every validator detail.
#[test]
fn schema_violations() {
    let xml = format!(
        r#"<csw:GetRecords {CSW_XMLNS} version="2.0.2" resultType="all"><csw:Query typeNames="csw:Record"/></csw:GetRecords>"#
    );
    match read_fault(&xml) {
        CswError::SchemaValidation { details } => {
            assert!(details.len() >= 2, "details were {details:?}");
            assert!(details.iter().any(|d| d.contains("service")), "details were {details:?}");
        }
        other => panic!("expected a schema fault, got {other:?}"),
    }

    let xml = get_records_xml(
        "",
        r#"<csw:Query typeNames="csw:Record"><csw:Constraint><csw:CqlText>title = 'x'</csw:CqlText></csw:Constraint></csw:Query>"#,
    );
    assert_eq!(read_fault(&xml).code(), FaultCode::SchemaValidation);

    assert_eq!(read_fault("<csw:GetRecords").code(), FaultCode::SchemaValidation);
}

// Ensures filter dialect rules are enforced per declared version.
#[test]
fn filter_version_rules() {
    let like = |version: &str, escape_attribute: &str| {
        get_records_xml(
            "",
            &format!(
                r#"<csw:Query typeNames="csw:Record"><csw:Constraint version="{version}"><ogc:Filter>
                     <ogc:PropertyIsLike wildCard="*" singleChar="?" {escape_attribute}="!">
                       <ogc:PropertyName>dc:title</ogc:PropertyName><ogc:Literal>*ipsum*</ogc:Literal>
                     </ogc:PropertyIsLike>
                   </ogc:Filter></csw:Constraint></csw:Query>"#
            ),
        )
    };
    assert!(search_from_xml(&like("1.0.0", "escape")).is_ok());
    assert!(search_from_xml(&like("1.1.0", "escapeChar")).is_ok());

    let err = read_fault(&like("1.0.0", "escapeChar"));
    assert_eq!(err.code(), FaultCode::ConstraintSyntax);
    assert_eq!(err.locator(), Some("constraint"));

    let err = read_fault(&like("3.0.0", "escapeChar"));
    assert_eq!(err.code(), FaultCode::InvalidParameterValue);
    assert_eq!(err.locator(), Some("constraint_language_version"));

    let spatial = get_records_xml(
        "",
        r#"<csw:Query typeNames="csw:Record"><csw:Constraint version="1.1.0"><ogc:Filter>
             <ogc:BBOX><ogc:PropertyName>ows:BoundingBox</ogc:PropertyName></ogc:BBOX>
           </ogc:Filter></csw:Constraint></csw:Query>"#,
    );
    assert_eq!(read_fault(&spatial).code(), FaultCode::ConstraintSyntax);
}

// Ensures like patterns authored with custom markers normalize to SQL form.
#[test]
fn like_markers_normalize() -> Result<()> {
    let xml = get_records_xml(
        "",
        r#"<csw:Query typeNames="csw:Record"><csw:Constraint version="1.1.0"><ogc:Filter>
             <ogc:PropertyIsLike wildCard="*" singleChar="?" escapeChar="!">
               <ogc:PropertyName>dc:title</ogc:PropertyName><ogc:Literal>*ip?um!*</ogc:Literal>
             </ogc:PropertyIsLike>
           </ogc:Filter></csw:Constraint></csw:Query>"#,
    );
    let search = search_from_xml(&xml)?;
    match search.query.predicate() {
        Some(Predicate::Like { pattern, .. }) => assert_eq!(pattern.sql(), "%ip_um*"),
        other => panic!("unexpected predicate {other:?}"),
    }
    Ok(())
}

// Ensures documents outside the service namespace are not dispatched.
#[test]
fn unknown_roots_are_not_supported() {
    let xml = format!(r#"<csw:Harvest {CSW_XMLNS} service="CSW" version="2.0.2"/>"#);
    assert_eq!(read_fault(&xml).code(), FaultCode::OperationNotSupported);

    let xml = r#"<GetRecords xmlns="http://example.com/other" service="CSW" version="2.0.2"><Query typeNames="csw:Record"/></GetRecords>"#;
    assert_eq!(read_fault(xml).code(), FaultCode::OperationNotSupported);
}

// Ensures GetCapabilities documents collect their nested lists.
#[test]
fn get_capabilities_document() -> Result<()> {
    let xml = format!(
        r#"<csw:GetCapabilities {CSW_XMLNS} xmlns:ows="http://www.opengis.net/ows" service="CSW" updateSequence="7">
             <ows:AcceptVersions><ows:Version>2.0.2</ows:Version><ows:Version>3.0.0</ows:Version></ows:AcceptVersions>
             <ows:Sections><ows:Section>Filter_Capabilities</ows:Section></ows:Sections>
             <ows:AcceptFormats><ows:OutputFormat>text/xml</ows:OutputFormat></ows:AcceptFormats>
           </csw:GetCapabilities>"#
    );
    let Request::GetCapabilities(request) = reader()?.read_xml(&xml)? else {
        panic!("expected GetCapabilities");
    };
    assert_eq!(request.service, "CSW");
    assert_eq!(request.accept_versions, vec!["2.0.2", "3.0.0"]);
    assert_eq!(request.sections, vec!["Filter_Capabilities"]);
    assert_eq!(request.accept_formats, vec!["text/xml"]);
    assert_eq!(request.update_sequence.as_deref(), Some("7"));
    Ok(())
}

// Ensures a document supplied as its JSON tree reads like the XML form.
#[test]
fn json_tree_matches_xml() -> Result<()> {
    let tree = read_document_json(
        r#"{
          "name": "csw:GetRecords",
          "namespaces": {"csw": "http://www.opengis.net/cat/csw/2.0.2"},
          "attributes": {"service": "CSW", "version": "2.0.2", "maxRecords": "5"},
          "children": [
            {"name": "csw:Query", "attributes": {"typeNames": "csw:Record"},
             "children": [{"name": "csw:ElementSetName", "text": "full"}]}
          ]
        }"#,
    )?;
    let from_tree = support::expect_search(reader()?.read_document(&tree)?)?;
    let from_xml = search_from_xml(&get_records_xml(
        r#"maxRecords="5""#,
        r#"<csw:Query typeNames="csw:Record"><csw:ElementSetName>full</csw:ElementSetName></csw:Query>"#,
    ))?;
    assert_eq!(from_tree, from_xml);
    Ok(())
}
