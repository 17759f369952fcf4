use docstore::codec::{FieldCache, FieldType, ValueDecoder, ValueEncoder};
use docstore::common::{list_of, Bytes, Value};
use docstore::document::Document;
use docstore::errors::ErrorKind;
use docstore::value_map;
use docstore_derive::DocumentObject;
use std::collections::BTreeMap;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[derive(Debug, Clone, Default, PartialEq, DocumentObject)]
pub struct Address {
    pub city: String,
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, DocumentObject)]
pub struct Employee {
    #[document(rename = "EmpID")]
    pub emp_id: i64,
    pub name: String,
    pub address: Address,
    pub previous: Vec<Address>,
    pub skills: BTreeMap<String, i32>,
    pub active: bool,
    pub salary: f64,
    pub photo: Bytes,
    pub manager: Option<String>,
    #[document(skip)]
    pub session: u64,
}

fn employee() -> Employee {
    Employee {
        emp_id: 7,
        name: "Ada".into(),
        address: Address {
            city: "London".into(),
            zip: Some("N1".into()),
        },
        previous: vec![Address {
            city: "Paris".into(),
            zip: None,
        }],
        skills: BTreeMap::from([("rust".to_string(), 9), ("sql".to_string(), 6)]),
        active: true,
        salary: 1250.5,
        photo: Bytes(vec![0xde, 0xad]),
        manager: None,
        session: 99,
    }
}

#[test]
fn test_derived_fields_are_described_in_declaration_order() {
    let cache = FieldCache::new();
    let doc = Document::from_object_with_cache(employee(), &cache);
    assert_eq!(
        doc.field_names(),
        vec!["EmpID", "name", "address", "previous", "skills", "active", "salary", "photo", "manager"]
    );

    let emp = employee();
    let fields = cache.fields_of(&emp);
    let emp_id = fields.match_name("EmpID").unwrap();
    assert!(emp_id.renamed());
    assert_eq!(emp_id.index(), 0);
    assert_eq!(fields.match_name("address").unwrap().field_type(), &FieldType::Object("Address"));
    assert!(fields.match_name("session").is_none());
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_typed_document_encodes_to_plain_values() {
    let value = Document::from_object(employee()).to_value().unwrap();
    let map = value.as_map().unwrap();

    assert_eq!(map["EmpID"], Value::Int(7));
    assert_eq!(map["address"], value_map! { "city": "London", "zip": "N1" });
    assert_eq!(map["previous"], list_of([value_map! { "city": "Paris", "zip": Value::Null }]));
    assert_eq!(map["skills"], value_map! { "rust": 9, "sql": 6 });
    assert_eq!(map["photo"], Value::Bytes(vec![0xde, 0xad]));
    assert_eq!(map["manager"], Value::Null);
    assert!(!map.contains_key("session"));
}

#[test]
fn test_typed_round_trip_through_encoder_protocol() {
    let source = Document::from_object(employee());
    let mut encoder = ValueEncoder::new();
    source.encode(&mut encoder).unwrap();
    let encoded = encoder.finish().unwrap();

    let mut target = Document::from_object(Employee::default());
    target.decode(&ValueDecoder::new(&encoded)).unwrap();

    let decoded = target.into_object::<Employee>().unwrap();
    let expected = Employee {
        session: 0,
        ..employee()
    };
    assert_eq!(decoded, expected);
}

#[test]
fn test_decode_matches_names_case_insensitively() {
    let mut doc = Document::from_object(Address::default());
    doc.decode_value(&value_map! { "CITY": "Rome", "Zip": "00100" }).unwrap();
    let address = doc.as_object::<Address>().unwrap();
    assert_eq!(address.city, "Rome");
    assert_eq!(address.zip.as_deref(), Some("00100"));
}

#[test]
fn test_decode_rejects_unknown_keys_and_bad_types() {
    let mut doc = Document::from_object(Address::default());
    let err = doc.decode_value(&value_map! { "city": "Rome", "country": "IT" }).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidArgument);

    let mut doc = Document::from_object(Employee::default());
    let err = doc.decode_value(&value_map! { "active": "yes" }).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidArgument);

    let err = doc.decode_value(&value_map! { "EmpID": "seven" }).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
}

#[test]
fn test_decode_null_resets_field() {
    let mut doc = Document::from_object(employee());
    doc.decode_value(&value_map! { "name": Value::Null, "manager": "Grace" }).unwrap();
    let emp = doc.as_object::<Employee>().unwrap();
    assert_eq!(emp.name, "");
    assert_eq!(emp.manager.as_deref(), Some("Grace"));
    assert_eq!(emp.emp_id, 7);
}

#[test]
fn test_map_and_typed_documents_share_paths() {
    let mut typed = Document::from_object(employee());
    let mut untyped = Document::from_value(typed.to_value().unwrap()).unwrap();

    for doc in [&mut typed, &mut untyped] {
        assert_eq!(doc.get(&["address", "city"]).unwrap(), Some(Value::from("London")));
        assert_eq!(doc.get(&["skills", "rust"]).unwrap(), Some(Value::Int(9)));
        assert!(doc.get(&["address", "street"]).unwrap().is_none());

        doc.set(&["address", "city"], "Leeds").unwrap();
        doc.set(&["skills", "go"], 3).unwrap();
        assert_eq!(doc.get(&["address", "city"]).unwrap(), Some(Value::from("Leeds")));

        let err = doc.get(&["name", "first"]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    assert_eq!(typed.as_object::<Employee>().unwrap().skills["go"], 3);
    assert_eq!(typed.to_value().unwrap(), untyped.to_value().unwrap());

    // a typed document cannot grow new fields; a map can
    assert!(typed.set(&["address", "street"], "High St").is_err());
    assert!(untyped.set(&["address", "street"], "High St").is_ok());
}

#[test]
fn test_set_field_checks_declared_type() {
    let mut doc = Document::from_object(employee());
    doc.set_field("salary", 10).unwrap();
    assert_eq!(doc.as_object::<Employee>().unwrap().salary, 10.0);

    let err = doc.set_field("skills", "many").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidArgument);

    let err = doc.set_field("EmpID", 1.5).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
}

#[test]
fn test_field_cache_is_shared_by_clones() {
    let cache = FieldCache::new();
    let shared = cache.clone();
    Document::from_object_with_cache(Address::default(), &cache)
        .to_value()
        .unwrap();
    Document::from_object_with_cache(employee(), &shared)
        .to_value()
        .unwrap();
    assert_eq!(cache.len(), 2);
}
