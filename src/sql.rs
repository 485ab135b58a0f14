pub mod ddl {
    pub mod table;
}

pub mod dml {
    pub mod entity;
    pub mod query;
}
