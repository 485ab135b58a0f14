use anyhow::Result;
use tracing_subscriber::EnvFilter;

use bnljdb::buffer::manager::BufferPoolManager;
use bnljdb::rdbms::{
    clocksweep::ClockSweepManager, context::ExecContext, disk::DiskManager,
    join::BlockNestedLoopJoin, query::SeqScan, table::SimpleTable,
};
use bnljdb::record;
use bnljdb::sql::ddl::table::Table;
use bnljdb::sql::dml::{
    entity::{Field, Schema, Type},
    query::{Executor, PlanNode},
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // config
    let disk = DiskManager::open("bnlj-sample.rly")?;
    let mut bufmgr = ClockSweepManager::new(disk, 10);
    let ctx = ExecContext::new(4);

    let mut people = SimpleTable::new(Schema::new(vec![
        Field::new("id", Type::Int),
        Field::new("name", Type::String(16)),
        Field::new("dept_id", Type::Int),
    ]));
    people.create(&mut bufmgr)?;
    people.insert(&mut bufmgr, &record![1, "Alice", 10])?;
    people.insert(&mut bufmgr, &record![2, "Bob", 20])?;
    people.insert(&mut bufmgr, &record![3, "Charlie", 10])?;
    people.insert(&mut bufmgr, &record![4, "Dave", 30])?;
    people.insert(&mut bufmgr, &record![5, "Eve", 40])?;

    let mut depts = SimpleTable::new(Schema::new(vec![
        Field::new("dept_id", Type::Int),
        Field::new("title", Type::String(16)),
    ]));
    depts.create(&mut bufmgr)?;
    depts.insert(&mut bufmgr, &record![10, "Engineering"])?;
    depts.insert(&mut bufmgr, &record![20, "Sales"])?;
    depts.insert(&mut bufmgr, &record![30, "Support"])?;

    bufmgr.flush()?;

    // query
    let left = SeqScan::new(&mut bufmgr, people.heap())?;
    let right = SeqScan::new(&mut bufmgr, depts.heap())?;
    let plan = BlockNestedLoopJoin::new(&mut bufmgr, &left, &right, "dept_id", "dept_id", &ctx)?;
    println!("estimated io cost: {}", plan.estimate_io_cost(&mut bufmgr)?);

    let mut exec = plan.start(&mut bufmgr)?;
    while exec.has_next(&mut bufmgr)? {
        println!("{}", exec.next(&mut bufmgr)?);
    }
    Ok(())
}
