pub mod mock_plant;
